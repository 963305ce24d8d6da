//! Lifetime and device analyses for pvlife.
//!
//! This crate provides:
//! - Recombination model definitions with a fixed parameter layout
//! - Bounded robust fitting of a model to a measured lifetime curve
//! - Model simulation at prescribed parameters
//! - Metric extraction at a reference excess density
//! - Lifetime derivation from raw photoconductance and Suns-Voc transients
//! - Internal quantum efficiency and loss breakdown
//! - Current-voltage performance and parasitic resistance analysis
//! - Parallel batch fitting with per-job failure reporting

pub mod batch;
pub mod error;
pub mod iv;
pub mod lifetime;
pub mod photoconductance;
pub mod qe;
pub mod suns_voc;

pub use batch::{BatchConfig, BatchOutcome, BatchReport, FitJob, fit_batch};
pub use error::{Error, ErrorKind, FitStage, FittingError, Result};
pub use iv::{
    IvCurve, IvMeasurement, IvResult, Performance, calc_performance, calc_series_resistance,
    calc_shunt_resistance, process_iv,
};
pub use lifetime::{
    Component, FitConfig, FitDiagnostics, FitResult, FittedParam, LifetimeMetrics,
    LifetimeModel, ModelCurves, ModelEvaluator, Param, ParamLayout, ParamSpec, ResampleGrid,
    SimulationJob, fit_lifetime, simulate_lifetime,
};
pub use photoconductance::{
    PhotoconductanceConfig, PhotoconductanceResult, charge_density, derive_lifetime,
    mobility_sum, process_photoconductance, trim_transient,
};
pub use qe::{
    QeConfig, QeJob, QeLoss, QeResult, SolarSpectrum, SpectralWeighting, internal_qe,
    loss_breakdown, process_quantum_efficiency, spectral_weighting,
};
pub use suns_voc::{charge_density_from_voltage, process_suns_voc};
