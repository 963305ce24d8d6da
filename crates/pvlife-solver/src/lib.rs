//! Numerical solvers for pvlife.
//!
//! This crate provides:
//! - Dense linear solves and polynomial least-squares fits
//! - Robust loss functions
//! - Bounded nonlinear least squares (Levenberg-Marquardt with a
//!   finite-difference Jacobian)
//! - Savitzky-Golay smoothing and differentiation
//! - Linear regression, R^2 and sample grids

pub mod error;
pub mod filter;
pub mod grid;
pub mod least_squares;
pub mod linear;
pub mod loss;
pub mod regression;

pub use error::{Error, Result};
pub use filter::{EdgeMode, SavGol, savgol_coefficients, savgol_filter};
pub use grid::{linspace, logspace};
pub use least_squares::{
    Bounds, LeastSquaresConfig, LeastSquaresResult, ResidualFunction, Termination, least_squares,
};
pub use linear::{polyfit, polyval_derivative, solve_dense};
pub use loss::Loss;
pub use regression::{LinearFit, linear_regression, mean, r_squared};
