//! Core types shared by every pvlife crate.
//!
//! This crate holds the pieces that carry no physics of their own:
//! - The process-wide physical constants table
//! - Measurement and lifetime-curve records exchanged with import layers
//! - Input validation errors
//! - Unit formatting for reports

pub mod constants;
pub mod error;
pub mod record;
pub mod units;

pub use constants::thermal_voltage;
pub use error::{InputError, Result};
pub use record::{
    Doping, DopingType, IlluminationMode, LifetimeCurve, MeasurementParams,
    PhotoconductanceRecord, QeMeasurement, SunsVocRecord,
};
