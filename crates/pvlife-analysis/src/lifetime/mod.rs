//! Injection-dependent lifetime modelling.

pub mod fit;
pub mod metrics;
pub mod model;
pub mod simulate;

pub use fit::{FitConfig, FitDiagnostics, FitResult, ResampleGrid, fit_lifetime};
pub use metrics::{FittedParam, LifetimeMetrics, reference_density, reference_index};
pub use model::{
    Component, LifetimeModel, ModelCurves, ModelEvaluator, Param, ParamLayout, ParamSpec,
};
pub use simulate::{SimulationJob, simulate_lifetime};
