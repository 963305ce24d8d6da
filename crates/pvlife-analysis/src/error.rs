//! Error types for pvlife-analysis.

use std::fmt;

use pvlife_core::InputError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifetime::Param;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A physical formula was evaluated outside its valid domain.
    #[error(transparent)]
    Domain(pvlife_physics::Error),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("invalid lifetime model: {0}")]
    Model(String),

    #[error(transparent)]
    Fitting(Box<FittingError>),

    #[error(transparent)]
    Solver(#[from] pvlife_solver::Error),
}

impl From<pvlife_physics::Error> for Error {
    fn from(err: pvlife_physics::Error) -> Self {
        match err {
            pvlife_physics::Error::Input(input) => Self::Input(input),
            other => Self::Domain(other),
        }
    }
}

impl From<FittingError> for Error {
    fn from(err: FittingError) -> Self {
        Self::Fitting(Box::new(err))
    }
}

/// Coarse classification for batch callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Domain,
    Input,
    Fitting,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(_) => ErrorKind::Domain,
            Self::Input(_) | Self::Model(_) => ErrorKind::Input,
            Self::Fitting(_) | Self::Solver(_) => ErrorKind::Fitting,
        }
    }
}

/// Step of the fitting pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStage {
    /// Model evaluation at the starting point.
    Evaluate,
    /// The bounded least-squares minimisation.
    Optimize,
    /// Metric lookup at the reference density.
    ReferenceExtraction,
}

impl fmt::Display for FitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evaluate => write!(f, "model evaluation"),
            Self::Optimize => write!(f, "optimisation"),
            Self::ReferenceExtraction => write!(f, "reference extraction"),
        }
    }
}

/// Failed lifetime fit with enough context to diagnose it.
///
/// Bounds, initial values and last values are log10 parameters in layout
/// order.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{stage} failed: {message}")]
pub struct FittingError {
    pub stage: FitStage,
    pub message: String,
    pub parameters: Vec<Param>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub initial: Vec<f64>,
    /// Robust cost at the initial values, when it could be evaluated.
    pub initial_cost: Option<f64>,
    /// Last parameter values the optimiser held.
    pub last: Option<Vec<f64>>,
}

pub type Result<T> = std::result::Result<T, Error>;
