//! Input validation errors.

use thiserror::Error;

/// A measurement record or configuration that cannot be processed as given.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("length mismatch: {field} has {actual} samples, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} is empty")]
    Empty(&'static str),

    #[error("{field} is not strictly increasing at index {index}")]
    NonMonotonic { field: &'static str, index: usize },

    #[error("{context}: need at least {required} samples, got {actual}")]
    TooFewSamples {
        context: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("{0} never crosses zero")]
    NoCrossing(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },

    #[error("unknown doping type: {0:?} (expected \"n-type\" or \"p-type\")")]
    UnknownDopingType(String),

    #[error("unknown illumination mode: {0:?} (expected \"gen\" or \"trans\")")]
    UnknownIlluminationMode(String),
}

pub type Result<T> = std::result::Result<T, InputError>;
