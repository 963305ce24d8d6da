//! Fitting a recombination model to a measured lifetime curve.

use log::{debug, info, warn};
use nalgebra::DVector;
use pvlife_core::{InputError, LifetimeCurve};
use pvlife_physics::{FixedPointCriteria, WaferState};
use pvlife_solver::{
    Bounds, LeastSquaresConfig, Termination, least_squares, logspace, r_squared,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, FitStage, FittingError, Result};
use crate::lifetime::metrics::{FittedParam, LifetimeMetrics, reference_density, reference_index};
use crate::lifetime::model::{LifetimeModel, ModelCurves, ModelEvaluator, Param, ParamLayout};

/// Log-spaced excess density axis for the output curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleGrid {
    /// log10 of the first density.
    pub start: f64,
    /// log10 of the last density.
    pub stop: f64,
    pub points: usize,
}

impl Default for ResampleGrid {
    fn default() -> Self {
        Self {
            start: 13.0,
            stop: 17.0,
            points: 100,
        }
    }
}

impl ResampleGrid {
    pub fn samples(&self) -> Vec<f64> {
        logspace(self.start, self.stop, self.points)
    }
}

/// Settings for [`fit_lifetime`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Inclusive density window applied to the measured samples. All
    /// samples are used when absent.
    pub nd_range: Option<(f64, f64)>,
    pub model: LifetimeModel,
    /// Density at which metrics are read. Defaults to a tenth of the
    /// majority doping.
    pub nd_ref: Option<f64>,
    pub grid: ResampleGrid,
    pub solver: LeastSquaresConfig,
    pub fixed_point: FixedPointCriteria,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            nd_range: None,
            model: LifetimeModel::standard(),
            nd_ref: None,
            grid: ResampleGrid::default(),
            solver: LeastSquaresConfig::default(),
            fixed_point: FixedPointCriteria::default(),
        }
    }
}

impl FitConfig {
    pub fn with_nd_range(mut self, lo: f64, hi: f64) -> Self {
        self.nd_range = Some((lo, hi));
        self
    }

    pub fn with_model(mut self, model: LifetimeModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_nd_ref(mut self, nd_ref: f64) -> Self {
        self.nd_ref = Some(nd_ref);
        self
    }

    pub fn with_grid(mut self, grid: ResampleGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_solver(mut self, solver: LeastSquaresConfig) -> Self {
        self.solver = solver;
        self
    }
}

/// How the optimiser got to its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Measured samples inside the density window.
    pub samples: usize,
    pub iterations: usize,
    pub evaluations: usize,
    pub initial_cost: f64,
    pub cost: f64,
    pub optimality: f64,
    pub termination: Termination,
    /// `measured - model` at the fitted densities.
    pub residuals: Vec<f64>,
    /// Measured samples whose fixed-point loop hit the iteration cap.
    pub unconverged_samples: usize,
}

/// Model curves, parameters and metrics from a fit or a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: LifetimeModel,
    pub parameters: Vec<FittedParam>,
    pub curves: ModelCurves,
    /// Coefficient of determination over the measured samples; absent for
    /// simulations.
    #[serde(rename = "R2")]
    pub r_squared: Option<f64>,
    pub metrics: LifetimeMetrics,
    pub diagnostics: Option<FitDiagnostics>,
}

impl FitResult {
    /// Linear-scale value of a parameter.
    pub fn param(&self, param: Param) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| p.param == param)
            .map(|p| p.value)
    }
}

/// Context attached to every failure after the layout is known.
struct FailureContext<'a> {
    layout: &'a ParamLayout,
    initial_cost: Option<f64>,
}

impl FailureContext<'_> {
    fn error(&self, stage: FitStage, message: String, last: Option<Vec<f64>>) -> Error {
        FittingError {
            stage,
            message,
            parameters: self.layout.params(),
            lower: self.layout.lower(),
            upper: self.layout.upper(),
            initial: self.layout.initial(),
            initial_cost: self.initial_cost,
            last,
        }
        .into()
    }
}

fn delog(x: &DVector<f64>) -> Vec<f64> {
    x.iter().map(|&v| 10f64.powf(v)).collect()
}

/// Fitted model on the resample grid.
pub(crate) struct Resampled {
    pub curves: ModelCurves,
    pub parameters: Vec<FittedParam>,
    pub nd_ref: f64,
    /// Absent when the grid ends below the reference density.
    pub metrics: Option<LifetimeMetrics>,
}

pub(crate) fn reference_message(nd_ref: f64, curves: &ModelCurves) -> String {
    format!(
        "no resampled density at or above the reference {:e} cm^-3 (grid ends at {:e})",
        nd_ref,
        curves.dn.last().copied().unwrap_or(f64::NAN)
    )
}

/// Evaluate the model at linear-scale `values` on `grid`, then read metrics
/// at the reference density.
pub(crate) fn resample(
    wafer: &WaferState,
    model: &LifetimeModel,
    layout: &ParamLayout,
    values: &[f64],
    grid: &ResampleGrid,
    nd_ref: Option<f64>,
) -> Result<Resampled> {
    let profile = wafer.injection_profile(&grid.samples())?;
    let evaluator = ModelEvaluator::new(
        model,
        layout,
        &profile,
        wafer.majority_doping(),
        wafer.thickness,
    )?;
    let curves = evaluator.curves(values);

    let parameters: Vec<FittedParam> = layout
        .params()
        .into_iter()
        .zip(values)
        .map(|(param, &value)| FittedParam {
            param,
            value,
            log10: value.log10(),
        })
        .collect();

    let nd_ref = reference_density(nd_ref, wafer.majority_doping());
    let metrics = reference_index(&curves.dn, nd_ref)
        .map(|index| LifetimeMetrics::at(&curves, index, nd_ref, &parameters, wafer))
        .transpose()?;

    Ok(Resampled {
        curves,
        parameters,
        nd_ref,
        metrics,
    })
}

/// Fit `config.model` to a measured lifetime curve.
///
/// Radiative and Auger lifetimes are computed once per measured density;
/// surface and SRH parameters are fitted in log10 space with bounded robust
/// least squares. The fitted model is then resampled on `config.grid` and
/// metrics are read at the first grid sample at or above the reference
/// density.
///
/// # Errors
/// - [`Error::Input`] for an invalid curve or too few samples in range
/// - [`Error::Model`] for an invalid component set
/// - [`Error::Domain`] when the carrier physics is evaluated out of domain
/// - [`Error::Fitting`] when the optimiser fails or the reference density
///   lies beyond the resample grid
pub fn fit_lifetime(curve: &LifetimeCurve, config: &FitConfig) -> Result<FitResult> {
    curve.validate()?;
    let layout = config.model.layout()?;
    if layout.is_empty() {
        return Err(Error::Model("no fit parameters".to_string()));
    }

    let wafer = WaferState::new(
        curve.temperature,
        curve.wafer_thickness,
        curve.doping,
        config.fixed_point,
    )?;

    let (nd, tau) = match config.nd_range {
        Some((lo, hi)) => curve.trimmed(lo, hi),
        None => (curve.nd.clone(), curve.tau.clone()),
    };
    if nd.len() <= layout.len() {
        return Err(InputError::TooFewSamples {
            context: "lifetime fit",
            required: layout.len() + 1,
            actual: nd.len(),
        }
        .into());
    }

    let profile = wafer.injection_profile(&nd)?;
    let evaluator = ModelEvaluator::new(
        &config.model,
        &layout,
        &profile,
        wafer.majority_doping(),
        wafer.thickness,
    )?;

    let residual = |x: &DVector<f64>| {
        let model = evaluator.tau_eff(&delog(x));
        DVector::from_iterator(
            tau.len(),
            tau.iter().zip(&model).map(|(measured, fitted)| measured - fitted),
        )
    };

    let x0 = DVector::from_vec(layout.initial());
    let start = residual(&x0);
    let mut context = FailureContext {
        layout: &layout,
        initial_cost: None,
    };
    if let Some(i) = start.iter().position(|r| !r.is_finite()) {
        return Err(context.error(
            FitStage::Evaluate,
            format!("model lifetime at nd = {:e} is not finite", nd[i]),
            None,
        ));
    }
    context.initial_cost = Some(config.solver.loss.cost(start.as_slice(), config.solver.f_scale));

    let bounds = Bounds::new(layout.lower(), layout.upper())?;
    let solution = least_squares(&residual, &x0, &bounds, &config.solver).map_err(|err| {
        let last = match &err {
            pvlife_solver::Error::ConvergenceFailed { x, .. } => Some(x.clone()),
            _ => None,
        };
        context.error(FitStage::Optimize, err.to_string(), last)
    })?;

    let values = delog(&solution.x);
    let model_tau = evaluator.tau_eff(&values);
    let r2 = r_squared(&tau, &model_tau);

    debug!(
        "fit of {} samples: {:?} after {} iterations, cost {:.4e} -> {:.4e}",
        nd.len(),
        solution.termination,
        solution.iterations,
        solution.initial_cost,
        solution.cost
    );

    let Resampled {
        curves,
        parameters,
        nd_ref,
        metrics,
    } = resample(
        &wafer,
        &config.model,
        &layout,
        &values,
        &config.grid,
        config.nd_ref,
    )?;
    let Some(metrics) = metrics else {
        return Err(context.error(
            FitStage::ReferenceExtraction,
            reference_message(nd_ref, &curves),
            Some(solution.x.iter().copied().collect()),
        ));
    };

    if !profile.unconverged.is_empty() {
        warn!(
            "{} measured samples used an unconverged effective intrinsic density",
            profile.unconverged.len()
        );
    }
    info!(
        "lifetime fit: R^2 = {:.5}, {}",
        r2,
        parameters
            .iter()
            .map(|p| format!("{} = {:.4e}", p.param, p.value))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(FitResult {
        model: config.model.clone(),
        parameters,
        curves,
        r_squared: Some(r2),
        metrics,
        diagnostics: Some(FitDiagnostics {
            samples: nd.len(),
            iterations: solution.iterations,
            evaluations: solution.evaluations,
            initial_cost: solution.initial_cost,
            cost: solution.cost,
            optimality: solution.optimality,
            termination: solution.termination,
            residuals: solution.residuals.iter().copied().collect(),
            unconverged_samples: profile.unconverged.len(),
        }),
    })
}
