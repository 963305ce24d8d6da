//! Robust loss functions for least squares.
//!
//! A loss `rho(z)` acts on the squared, scaled residual `z = (f / f_scale)^2`.
//! The total cost is `0.5 f_scale^2 sum_i rho(z_i)`.

use serde::{Deserialize, Serialize};

/// Loss applied to each squared residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// Ordinary least squares, `rho(z) = z`.
    Linear,
    /// Smooth approximation of l1, `rho(z) = 2 ((1 + z)^0.5 - 1)`.
    SoftL1,
    /// `rho(z) = z` for `z <= 1`, `2 z^0.5 - 1` otherwise.
    Huber,
    /// `rho(z) = ln(1 + z)`. Strongly attenuates outliers.
    #[default]
    Cauchy,
    /// `rho(z) = arctan(z)`. Caps the influence of any single residual.
    Arctan,
}

impl Loss {
    /// `(rho(z), rho'(z))`.
    pub fn evaluate(self, z: f64) -> (f64, f64) {
        match self {
            Loss::Linear => (z, 1.0),
            Loss::SoftL1 => {
                let t = 1.0 + z;
                (2.0 * (t.sqrt() - 1.0), 1.0 / t.sqrt())
            }
            Loss::Huber => {
                if z <= 1.0 {
                    (z, 1.0)
                } else {
                    let s = z.sqrt();
                    (2.0 * s - 1.0, 1.0 / s)
                }
            }
            Loss::Cauchy => (z.ln_1p(), 1.0 / (1.0 + z)),
            Loss::Arctan => (z.atan(), 1.0 / (1.0 + z * z)),
        }
    }

    /// Robust cost of a residual vector.
    pub fn cost(self, residuals: &[f64], f_scale: f64) -> f64 {
        let c2 = f_scale * f_scale;
        let sum: f64 = residuals
            .iter()
            .map(|&f| self.evaluate(f * f / c2).0)
            .sum();
        0.5 * c2 * sum
    }

    /// Per-residual weights `sqrt(rho'(z))`.
    ///
    /// Multiplying residuals and Jacobian rows by these gives a Gauss-Newton
    /// model with the exact robust gradient.
    pub fn weights(self, residuals: &[f64], f_scale: f64) -> Vec<f64> {
        let c2 = f_scale * f_scale;
        residuals
            .iter()
            .map(|&f| self.evaluate(f * f / c2).1.sqrt())
            .collect()
    }
}
