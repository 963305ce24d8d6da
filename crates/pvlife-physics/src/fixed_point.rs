//! Scalar fixed-point iteration for the effective intrinsic density.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Convergence criteria for the self-consistent `n_i` loops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedPointCriteria {
    /// Relative change `|x - x_prev| / x_prev` accepted as converged.
    pub rel_tol: f64,
    /// Iteration cap. Reaching it is reported, not an error.
    pub max_iterations: usize,
}

impl Default for FixedPointCriteria {
    fn default() -> Self {
        Self {
            rel_tol: 1e-4,
            max_iterations: 20,
        }
    }
}

impl FixedPointCriteria {
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = rel_tol;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// How a fixed-point loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPointReport {
    /// Number of updates performed.
    pub iterations: usize,
    /// Whether the relative tolerance was met before the cap.
    pub converged: bool,
    /// Relative change of the final update.
    pub rel_change: f64,
}

/// Iterate `x <- step(x)` from `initial` until the relative change meets
/// `criteria.rel_tol` or the iteration cap is reached.
///
/// Returns the last iterate either way; callers inspect the report to tell
/// the two apart. Errors from `step` and non-finite iterates abort the loop.
pub fn iterate<F>(
    initial: f64,
    criteria: &FixedPointCriteria,
    mut step: F,
) -> Result<(f64, FixedPointReport)>
where
    F: FnMut(f64) -> Result<f64>,
{
    let mut x = initial;
    let mut rel_change = f64::INFINITY;

    for iteration in 0..criteria.max_iterations {
        let next = step(x)?;
        if !next.is_finite() || next <= 0.0 {
            return Err(Error::domain(
                "effective intrinsic density",
                next,
                "fixed-point update left the positive reals",
            ));
        }

        rel_change = ((next - x) / x).abs();
        debug!(
            "fixed point iter {}: x = {:.6e}, rel change = {:.3e}",
            iteration + 1,
            next,
            rel_change
        );
        x = next;

        if rel_change <= criteria.rel_tol {
            return Ok((
                x,
                FixedPointReport {
                    iterations: iteration + 1,
                    converged: true,
                    rel_change,
                },
            ));
        }
    }

    Ok((
        x,
        FixedPointReport {
            iterations: criteria.max_iterations,
            converged: false,
            rel_change,
        },
    ))
}
