//! # pvlife
//!
//! Injection-dependent carrier lifetime analysis for silicon wafers.
//!
//! pvlife provides:
//! - Intrinsic carrier statistics, bandgap narrowing and steady-state
//!   carrier densities under illumination
//! - Intrinsic (radiative, Auger), surface and SRH lifetime models
//! - Bounded robust fitting of recombination models to lifetime curves
//! - Lifetime derivation from raw photoconductance and Suns-Voc transients
//! - Internal quantum efficiency and optical loss breakdown
//! - Current-voltage performance and parasitic resistances
//!
//! ## Quick Start
//!
//! ```rust
//! use pvlife::prelude::*;
//!
//! let job = SimulationJob::new(298.15, 0.03, Doping::donors(1e15))
//!     .with_param(Param::J0, 1e-14)
//!     .with_param(Param::MinorityLifetime, 1e-4)
//!     .with_param(Param::MajorityLifetime, 1e-4);
//! let simulated = simulate_lifetime(&job).unwrap();
//!
//! let curve = LifetimeCurve {
//!     nd: simulated.curves.dn.clone(),
//!     tau: simulated.curves.tau_eff.clone(),
//!     temperature: 298.15,
//!     wafer_thickness: 0.03,
//!     doping: Doping::donors(1e15),
//! };
//! let fitted = fit_lifetime(&curve, &FitConfig::default()).unwrap();
//! assert!(fitted.r_squared.unwrap() > 0.99);
//! ```
//!
//! ## Photoconductance
//!
//! ```rust,ignore
//! let record: PhotoconductanceRecord = serde_json::from_str(&text)?;
//! let derived = pvlife::process_photoconductance(&record, &PhotoconductanceConfig::default())?;
//! let fit = pvlife::fit_lifetime(&derived.to_lifetime_curve(), &FitConfig::default())?;
//! println!("t_eff = {:e} s", fit.metrics.t_eff);
//! ```

// Re-export member crates
pub use pvlife_analysis as analysis;
pub use pvlife_core as core;
pub use pvlife_physics as physics;
pub use pvlife_solver as solver;

// ============================================================================
// Convenient re-exports from pvlife_core
// ============================================================================

pub use pvlife_core::{
    Doping,
    DopingType,
    IlluminationMode,
    // Errors
    InputError,
    // Records
    LifetimeCurve,
    MeasurementParams,
    PhotoconductanceRecord,
    QeMeasurement,
    SunsVocRecord,
    thermal_voltage,
};

// ============================================================================
// Convenient re-exports from pvlife_physics
// ============================================================================

pub use pvlife_physics::{
    BandgapShift,
    EquilibriumState,
    // Errors
    Error as PhysicsError,
    // Fixed point iteration
    FixedPointCriteria,
    FixedPointReport,
    InjectionProfile,
    IntrinsicParams,
    SteadyState,
    // Wafer state
    WaferState,
    bandgap_narrowing,
    carrier_densities,
    doping_from_resistivity,
    // Lifetime components
    effective_lifetime,
    solve_equilibrium,
    solve_steady_state,
    tau_auger,
    tau_radiative,
    tau_srh,
    tau_surface,
};

// ============================================================================
// Convenient re-exports from pvlife_solver
// ============================================================================

pub use pvlife_solver::{
    Bounds,
    EdgeMode,
    // Errors
    Error as SolverError,
    // Least squares
    LeastSquaresConfig,
    LeastSquaresResult,
    Loss,
    ResidualFunction,
    // Smoothing
    SavGol,
    Termination,
    least_squares,
    linspace,
    logspace,
};

// ============================================================================
// Convenient re-exports from pvlife_analysis
// ============================================================================

pub use pvlife_analysis::{
    // Batch
    BatchConfig,
    BatchReport,
    // Lifetime models
    Component,
    // Errors
    Error,
    ErrorKind,
    FitConfig,
    FitJob,
    FitResult,
    FitStage,
    FittingError,
    // Current-voltage
    IvCurve,
    IvMeasurement,
    IvResult,
    LifetimeMetrics,
    LifetimeModel,
    ModelCurves,
    Param,
    Performance,
    // Photoconductance
    PhotoconductanceConfig,
    PhotoconductanceResult,
    // Quantum efficiency
    QeConfig,
    QeJob,
    QeResult,
    ResampleGrid,
    Result,
    SimulationJob,
    fit_batch,
    fit_lifetime,
    process_iv,
    process_photoconductance,
    process_quantum_efficiency,
    process_suns_voc,
    simulate_lifetime,
};

// ============================================================================
// Re-export commonly used external types
// ============================================================================

/// Re-export of nalgebra's dynamic vector type.
pub use nalgebra::DVector;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module containing commonly used types and functions.
///
/// ```rust
/// use pvlife::prelude::*;
/// ```
pub mod prelude {
    // Records
    pub use crate::{Doping, DopingType, IlluminationMode, LifetimeCurve, PhotoconductanceRecord};

    // Physics
    pub use crate::{FixedPointCriteria, WaferState};

    // Lifetime fitting
    pub use crate::{
        FitConfig, FitResult, LifetimeModel, Param, SimulationJob, fit_lifetime,
        simulate_lifetime,
    };

    // Measurements
    pub use crate::{
        IvMeasurement, PhotoconductanceConfig, QeConfig, QeMeasurement, SunsVocRecord, process_iv,
        process_photoconductance, process_quantum_efficiency, process_suns_voc,
    };

    // Batch
    pub use crate::{BatchConfig, FitJob, fit_batch};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wafer_from_resistivity() {
        let wafer = WaferState::from_resistivity(
            298.15,
            0.018,
            DopingType::NType,
            1.0,
            FixedPointCriteria::default(),
        )
        .unwrap();
        assert!((wafer.doping.majority().log10() - 15.69691).abs() < 1e-4);
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let model = LifetimeModel::standard();
        assert_eq!(model.layout().unwrap().params()[0], Param::J0);
        let config = BatchConfig::default();
        assert_eq!(config.min_items_for_parallel, 4);
    }
}
