//! Error types for pvlife-physics.

use pvlife_core::InputError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A physical formula received an argument outside its valid domain.
    #[error("{quantity} = {value:e} is outside the model domain: {reason}")]
    Domain {
        quantity: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error(transparent)]
    Input(#[from] InputError),
}

impl Error {
    pub(crate) fn domain(quantity: &'static str, value: f64, reason: &'static str) -> Self {
        Self::Domain {
            quantity,
            value,
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reject non-finite or non-positive values.
pub(crate) fn require_positive(quantity: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::domain(quantity, value, "must be finite and positive"))
    }
}
