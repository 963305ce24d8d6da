//! Evaluating a lifetime model at prescribed parameters.

use std::collections::BTreeMap;

use log::info;
use pvlife_core::{Doping, InputError};
use pvlife_physics::{FixedPointCriteria, WaferState};
use serde::{Deserialize, Serialize};

use crate::error::{Error, FitStage, FittingError, Result};
use crate::lifetime::fit::{FitResult, ResampleGrid, Resampled, reference_message, resample};
use crate::lifetime::model::{LifetimeModel, Param};

/// A wafer, a model and linear-scale values for every model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationJob {
    /// Temperature (K).
    pub temperature: f64,
    /// Wafer thickness (cm).
    pub wafer_thickness: f64,
    pub doping: Doping,
    #[serde(default)]
    pub model: LifetimeModel,
    pub parameters: BTreeMap<Param, f64>,
    #[serde(default)]
    pub nd_ref: Option<f64>,
    #[serde(default)]
    pub grid: ResampleGrid,
    #[serde(default)]
    pub fixed_point: FixedPointCriteria,
}

impl SimulationJob {
    pub fn new(temperature: f64, wafer_thickness: f64, doping: Doping) -> Self {
        Self {
            temperature,
            wafer_thickness,
            doping,
            model: LifetimeModel::standard(),
            parameters: BTreeMap::new(),
            nd_ref: None,
            grid: ResampleGrid::default(),
            fixed_point: FixedPointCriteria::default(),
        }
    }

    pub fn with_model(mut self, model: LifetimeModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_param(mut self, param: Param, value: f64) -> Self {
        self.parameters.insert(param, value);
        self
    }

    pub fn with_nd_ref(mut self, nd_ref: f64) -> Self {
        self.nd_ref = Some(nd_ref);
        self
    }
}

/// Evaluate `job.model` on the resample grid without fitting.
///
/// The result has the same shape as a fit, without R^2 or diagnostics.
pub fn simulate_lifetime(job: &SimulationJob) -> Result<FitResult> {
    job.doping.validate()?;
    let layout = job.model.layout()?;

    let values = layout
        .params()
        .into_iter()
        .map(|param| {
            let value = *job
                .parameters
                .get(&param)
                .ok_or(InputError::MissingField(param.name()))?;
            if !value.is_finite() || value <= 0.0 {
                return Err(InputError::InvalidValue {
                    field: param.name(),
                    value,
                });
            }
            Ok(value)
        })
        .collect::<std::result::Result<Vec<_>, InputError>>()?;

    let wafer = WaferState::new(
        job.temperature,
        job.wafer_thickness,
        job.doping,
        job.fixed_point,
    )?;
    let Resampled {
        curves,
        parameters,
        nd_ref,
        metrics,
    } = resample(&wafer, &job.model, &layout, &values, &job.grid, job.nd_ref)?;

    let Some(metrics) = metrics else {
        return Err(Error::from(FittingError {
            stage: FitStage::ReferenceExtraction,
            message: reference_message(nd_ref, &curves),
            parameters: layout.params(),
            lower: layout.lower(),
            upper: layout.upper(),
            initial: layout.initial(),
            initial_cost: None,
            last: Some(values.iter().map(|v| v.log10()).collect()),
        }));
    };

    info!(
        "simulated {} components at {} grid points: t_eff({:.3e}) = {:.4e} s",
        job.model.components.len(),
        curves.dn.len(),
        metrics.nd,
        metrics.t_eff
    );

    Ok(FitResult {
        model: job.model.clone(),
        parameters,
        curves,
        r_squared: None,
        metrics,
        diagnostics: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::fit::{FitConfig, fit_lifetime};
    use pvlife_core::LifetimeCurve;

    fn job() -> SimulationJob {
        SimulationJob::new(298.15, 0.03, Doping::donors(1e15))
            .with_param(Param::J0, 1e-14)
            .with_param(Param::MinorityLifetime, 1e-4)
            .with_param(Param::MajorityLifetime, 1e-4)
    }

    #[test]
    fn test_simulation_shape() {
        let result = simulate_lifetime(&job()).unwrap();
        assert_eq!(result.curves.dn.len(), 100);
        assert!(result.r_squared.is_none());
        assert!(result.diagnostics.is_none());
        assert_eq!(result.param(Param::J0), Some(1e-14));
        assert!((result.metrics.nd_ref - 1e14).abs() < 1.0);
        assert!(result.metrics.nd >= 1e14);
        assert!(result.curves.tau_blk.is_some());
    }

    #[test]
    fn test_missing_parameter() {
        let mut job = job();
        job.parameters.remove(&Param::MajorityLifetime);
        let err = simulate_lifetime(&job).unwrap_err();
        assert_eq!(err, Error::Input(InputError::MissingField("t_M0")));
    }

    #[test]
    fn test_non_positive_parameter() {
        let job = job().with_param(Param::J0, 0.0);
        assert!(matches!(
            simulate_lifetime(&job),
            Err(Error::Input(InputError::InvalidValue { field: "J_0", .. }))
        ));
    }

    #[test]
    fn test_reference_beyond_grid() {
        let job = job().with_nd_ref(1e18);
        match simulate_lifetime(&job) {
            Err(Error::Fitting(err)) => {
                assert_eq!(err.stage, FitStage::ReferenceExtraction);
                assert!(err.initial_cost.is_none());
                let last = err.last.unwrap();
                assert!((last[0] + 14.0).abs() < 1e-12);
            }
            other => panic!("expected a fitting error, got {:?}", other),
        }
    }

    #[test]
    fn test_simulated_curve_fits_back() {
        let simulated = simulate_lifetime(&job()).unwrap();
        let curve = LifetimeCurve {
            nd: simulated.curves.dn.clone(),
            tau: simulated.curves.tau_eff.clone(),
            temperature: 298.15,
            wafer_thickness: 0.03,
            doping: Doping::donors(1e15),
        };
        let fitted = fit_lifetime(&curve, &FitConfig::default()).unwrap();
        assert!(fitted.r_squared.unwrap() > 0.999);
        assert!((fitted.metrics.t_eff / simulated.metrics.t_eff - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_job_from_json() {
        let job: SimulationJob = serde_json::from_str(
            r#"{
                "temperature": 298.15,
                "wafer_thickness": 0.03,
                "doping": {"n_d": 1e15, "n_a": 0.0},
                "parameters": {"J_0": 1e-14, "t_m0": 1e-4, "t_M0": 1e-4}
            }"#,
        )
        .unwrap();
        assert_eq!(job.parameters.len(), 3);
        assert_eq!(job.model, LifetimeModel::standard());
        assert!(simulate_lifetime(&job).is_ok());
    }
}
