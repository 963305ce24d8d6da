//! Error types for pvlife-solver.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("singular matrix")]
    SingularMatrix,

    #[error("invalid matrix dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid bounds for variable {index}: [{lower}, {upper}]")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },

    #[error("initial point is outside the bounds at variable {index}: {value}")]
    InfeasibleStart { index: usize, value: f64 },

    #[error("residual {index} is not finite")]
    NonFiniteResidual { index: usize },

    #[error("convergence failed after {iterations} iterations (cost {cost:e})")]
    ConvergenceFailed {
        iterations: usize,
        cost: f64,
        /// Last accepted point.
        x: Vec<f64>,
    },

    #[error("invalid filter window: length {window}, polynomial order {order}, {samples} samples")]
    InvalidWindow {
        window: usize,
        order: usize,
        samples: usize,
    },

    #[error("need at least {required} points, got {actual}")]
    TooFewPoints { required: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
