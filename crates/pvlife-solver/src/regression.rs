//! Simple linear regression and goodness of fit.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ordinary least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Fit a straight line through `(x, y)`.
///
/// # Errors
/// - [`Error::DimensionMismatch`] for unequal lengths
/// - [`Error::TooFewPoints`] for fewer than two points
/// - [`Error::SingularMatrix`] when every `x` is identical
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(Error::DimensionMismatch {
            expected: x.len(),
            actual: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(Error::TooFewPoints {
            required: 2,
            actual: x.len(),
        });
    }

    let x_mean = mean(x);
    let y_mean = mean(y);
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx == 0.0 {
        return Err(Error::SingularMatrix);
    }

    let slope = sxy / sxx;
    let r_squared = if syy == 0.0 {
        1.0
    } else {
        sxy * sxy / (sxx * syy)
    };

    Ok(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
        r_squared,
    })
}

/// Coefficient of determination `1 - SS_res / SS_tot`.
///
/// NaN when the observations have no variance beyond rounding of their mean.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    let y_mean = mean(observed);
    let ss_tot: f64 = observed.iter().map(|&y| (y - y_mean).powi(2)).sum();
    let ss_obs: f64 = observed.iter().map(|&y| y * y).sum();
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(&y, &p)| (y - p).powi(2))
        .sum();

    if ss_tot <= f64::EPSILON * ss_obs {
        warn!("R^2 undefined: observations have zero variance");
        return f64::NAN;
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = linear_regression(&x, &y).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!((fit.predict(10.0) - 21.0).abs() < 1e-12);
    }

    #[test]
    fn test_noisy_line() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.1, 0.9, 2.2, 2.8, 4.1];
        let fit = linear_regression(&x, &y).unwrap();
        assert!((fit.slope - 1.0).abs() < 0.05);
        assert!(fit.r_squared > 0.98 && fit.r_squared < 1.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(
            linear_regression(&[1.0], &[1.0]),
            Err(Error::TooFewPoints { .. })
        ));
        assert!(matches!(
            linear_regression(&[2.0, 2.0], &[1.0, 3.0]),
            Err(Error::SingularMatrix)
        ));
        assert!(linear_regression(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn test_r_squared() {
        let obs = [1.0, 2.0, 3.0];
        assert_eq!(r_squared(&obs, &obs), 1.0);
        assert!((r_squared(&obs, &[2.0, 2.0, 2.0])).abs() < 1e-15);
        assert!(r_squared(&[5.0, 5.0], &[5.0, 5.0]).is_nan());
    }

    #[test]
    fn test_r_squared_constant_with_rounding() {
        // The mean of 1e-4 repeated does not round-trip exactly, so SS_tot
        // is a tiny positive number rather than zero.
        let obs = vec![1e-4; 30];
        let predicted = vec![1e-3; 30];
        assert!(r_squared(&obs, &predicted).is_nan());
        assert!(r_squared(&[0.0; 4], &[1.0; 4]).is_nan());

        // Small but genuine spread is still scored.
        let obs: Vec<f64> = (0..30).map(|i| 1e-4 * (1.0 + 1e-6 * i as f64)).collect();
        assert!((r_squared(&obs, &obs) - 1.0).abs() < 1e-12);
    }
}
