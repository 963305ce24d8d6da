//! Savitzky-Golay smoothing and differentiation.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::linear::{polyfit, polyval_derivative, solve_dense, vandermonde};

/// How samples closer than half a window to either end are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Fit one polynomial to the first (last) full window and evaluate it at
    /// the edge samples. Needs `window <= len`.
    #[default]
    Interp,
    /// Extend the signal by repeating the first (last) sample.
    Nearest,
}

/// Filter settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavGol {
    /// Odd window length.
    pub window: usize,
    /// Polynomial order, strictly below `window`.
    pub order: usize,
    /// Derivative to return; 0 smooths.
    pub deriv: usize,
    /// Sample spacing, applied as `delta^-deriv`.
    pub delta: f64,
    pub mode: EdgeMode,
}

impl SavGol {
    pub fn new(window: usize, order: usize) -> Self {
        Self {
            window,
            order,
            deriv: 0,
            delta: 1.0,
            mode: EdgeMode::Interp,
        }
    }

    pub fn with_deriv(mut self, deriv: usize) -> Self {
        self.deriv = deriv;
        self
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_mode(mut self, mode: EdgeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Filter `y`.
    ///
    /// # Errors
    /// [`Error::InvalidWindow`] when the window is even, not longer than the
    /// polynomial order, or (in [`EdgeMode::Interp`]) longer than the signal.
    pub fn apply(&self, y: &[f64]) -> Result<Vec<f64>> {
        let n = y.len();
        let invalid = Error::InvalidWindow {
            window: self.window,
            order: self.order,
            samples: n,
        };
        if self.window % 2 == 0 || self.window <= self.order || n == 0 {
            return Err(invalid);
        }
        if self.mode == EdgeMode::Interp && self.window > n {
            return Err(invalid);
        }

        let coeffs = savgol_coefficients(self.window, self.order, self.deriv, self.delta)?;
        let half = (self.window / 2) as isize;
        let last = n as isize - 1;

        let mut out: Vec<f64> = (0..n as isize)
            .map(|i| {
                coeffs
                    .iter()
                    .enumerate()
                    .map(|(j, &h)| h * y[(i + j as isize - half).clamp(0, last) as usize])
                    .sum()
            })
            .collect();

        if self.mode == EdgeMode::Interp {
            let half = self.window / 2;
            self.fit_edge(y, &mut out, 0, 0..half)?;
            self.fit_edge(y, &mut out, n - self.window, (n - half)..n)?;
        }

        Ok(out)
    }

    /// Replace `targets` with derivatives of a polynomial fitted to the
    /// window starting at `start`.
    fn fit_edge(
        &self,
        y: &[f64],
        out: &mut [f64],
        start: usize,
        targets: std::ops::Range<usize>,
    ) -> Result<()> {
        let centre = (start + self.window / 2) as f64;
        let t: Vec<f64> = (start..start + self.window)
            .map(|i| i as f64 - centre)
            .collect();
        let coeffs = polyfit(&t, &y[start..start + self.window], self.order)?;
        let scale = self.delta.powi(self.deriv as i32);
        for i in targets {
            out[i] = polyval_derivative(&coeffs, self.deriv, i as f64 - centre) / scale;
        }
        Ok(())
    }
}

/// Correlation weights for a centred window: the output at sample `i` is
/// `sum_j h[j] y[i + j - half]`.
pub fn savgol_coefficients(window: usize, order: usize, deriv: usize, delta: f64) -> Result<Vec<f64>> {
    if window % 2 == 0 || window <= order {
        return Err(Error::InvalidWindow {
            window,
            order,
            samples: window,
        });
    }
    if deriv > order {
        return Ok(vec![0.0; window]);
    }

    let half = (window / 2) as f64;
    let offsets: Vec<f64> = (0..window).map(|j| j as f64 - half).collect();
    let vander = vandermonde(&offsets, order);

    // Minimum-norm solution of vander^T h = e_deriv * deriv! / delta^deriv.
    let factorial: f64 = (1..=deriv).map(|k| k as f64).product();
    let mut rhs = DVector::zeros(order + 1);
    rhs[deriv] = factorial / delta.powi(deriv as i32);
    let gram = vander.transpose() * &vander;
    let v = solve_dense(&gram, &rhs)?;

    Ok((&vander * v).iter().copied().collect())
}

/// Apply a Savitzky-Golay filter of the given window and polynomial order.
///
/// See [`SavGol::apply`].
pub fn savgol_filter(
    y: &[f64],
    window: usize,
    order: usize,
    deriv: usize,
    delta: f64,
    mode: EdgeMode,
) -> Result<Vec<f64>> {
    SavGol {
        window,
        order,
        deriv,
        delta,
        mode,
    }
    .apply(y)
}
