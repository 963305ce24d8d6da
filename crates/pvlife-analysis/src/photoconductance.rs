//! Effective lifetime from a photoconductance transient.
//!
//! The conductance trace is converted to excess carrier density with the
//! Dannhauser-Krausse mobility model, differentiated with a
//! Savitzky-Golay filter and turned into an injection-dependent lifetime
//! using either the generalized or the transient analysis.

use log::{debug, info, warn};
use pvlife_core::constants::Q;
use pvlife_core::{
    Doping, IlluminationMode, InputError, LifetimeCurve, MeasurementParams,
    PhotoconductanceRecord,
};
use pvlife_physics::{FixedPointCriteria, WaferState};
use pvlife_solver::{EdgeMode, SavGol, linear_regression};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Short-circuit current density of one sun (A/cm^2).
pub const ONE_SUN_CURRENT: f64 = 0.038;

/// Mobility used for the first density estimate (cm^2/Vs).
const INITIAL_MOBILITY_SUM: f64 = 1700.0;

/// Settings for [`process_photoconductance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoconductanceConfig {
    /// Strip the flash rise and the noise tail before analysis.
    pub trim: bool,
    /// Conductance (S) below which samples are treated as noise.
    pub noise_floor: f64,
    /// Conductance (S) above which a rising trace is still in the flash.
    pub rise_threshold: f64,
    /// Filter for the slope and curvature used by trimming.
    pub trim_filter: SavGol,
    /// Filter for the density derivative.
    pub lifetime_filter: SavGol,
    pub fixed_point: FixedPointCriteria,
}

impl Default for PhotoconductanceConfig {
    fn default() -> Self {
        Self {
            trim: true,
            noise_floor: 2e-4,
            rise_threshold: 1e-3,
            trim_filter: SavGol::new(15, 2).with_mode(EdgeMode::Nearest),
            lifetime_filter: SavGol::new(21, 3).with_mode(EdgeMode::Interp),
            fixed_point: FixedPointCriteria::default(),
        }
    }
}

impl PhotoconductanceConfig {
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_noise_floor(mut self, noise_floor: f64) -> Self {
        self.noise_floor = noise_floor;
        self
    }
}

/// Lifetime data derived from one photoconductance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoconductanceResult {
    pub doping: Doping,
    /// Temperature (K).
    pub temperature: f64,
    /// Wafer thickness (cm).
    pub wafer_thickness: f64,
    /// Sample times after trimming (s).
    pub time: Vec<f64>,
    /// Excess carrier density (cm^-3).
    pub nd: Vec<f64>,
    /// Effective lifetime (s).
    pub tau: Vec<f64>,
    pub implied_suns: Vec<f64>,
    pub n_i_eff: Vec<f64>,
    /// Implied open-circuit voltage per sample (V).
    pub implied_voc_curve: Vec<f64>,
    /// Implied open-circuit voltage at one sun (V).
    pub implied_voc: f64,
    /// Resistivity from the dark conductance (ohm cm).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calc_wafer_resistivity: Option<f64>,
    /// Samples whose steady-state loop hit the iteration cap.
    pub unconverged_samples: usize,
}

impl PhotoconductanceResult {
    /// Samples usable for model fitting: positive density and a positive,
    /// finite lifetime.
    pub fn to_lifetime_curve(&self) -> LifetimeCurve {
        let (nd, tau) = self
            .nd
            .iter()
            .zip(&self.tau)
            .filter(|&(&nd, &tau)| nd > 0.0 && tau.is_finite() && tau > 0.0)
            .map(|(&nd, &tau)| (nd, tau))
            .unzip();
        LifetimeCurve {
            nd,
            tau,
            temperature: self.temperature,
            wafer_thickness: self.wafer_thickness,
            doping: self.doping,
        }
    }
}

/// Sum of electron and hole mobilities (cm^2/Vs) at total carrier density
/// `density`, after Dannhauser and Krausse.
pub fn mobility_sum(density: f64) -> f64 {
    let x = (density / 1.2e18).powf(0.8431);
    1800.0 * (1.0 + x) / (1.0 + 8.36 * x)
}

/// Excess carrier density (cm^-3) from photoconductance (S).
///
/// Starts from a constant mobility estimate and refines it once against
/// the injection-dependent mobility.
pub fn charge_density(n_m: f64, thickness: f64, conductance: &[f64]) -> Vec<f64> {
    conductance
        .iter()
        .map(|&sigma| {
            let n_0 = sigma / (thickness * INITIAL_MOBILITY_SUM * Q);
            let n_1 = n_0 * INITIAL_MOBILITY_SUM / mobility_sum(n_0 + n_m);
            n_1 * mobility_sum(n_0 + n_m) / mobility_sum(n_1 + n_m)
        })
        .collect()
}

/// Effective lifetime (s) at every sample of a density transient.
///
/// The derivative uses the mean sample spacing. In generalized mode
/// `tau = nd W / (G f - W dnd/dt)`; in transient mode `tau = -nd / (dnd/dt)`.
pub fn derive_lifetime(
    time: &[f64],
    nd: &[f64],
    illumination: &[f64],
    params: &MeasurementParams,
    filter: &SavGol,
) -> Result<Vec<f64>> {
    if nd.len() < filter.window || time.len() != nd.len() {
        return Err(InputError::TooFewSamples {
            context: "lifetime derivative",
            required: filter.window,
            actual: nd.len().min(time.len()),
        }
        .into());
    }
    if illumination.len() != nd.len() {
        return Err(InputError::LengthMismatch {
            field: "illumination",
            expected: nd.len(),
            actual: illumination.len(),
        }
        .into());
    }

    let span = time[time.len() - 1] - time[0];
    let sample_rate = span / (time.len() - 1) as f64;
    let dnd = filter.with_deriv(1).with_delta(sample_rate).apply(nd)?;

    let w = params.wafer_thickness;
    let tau = match params.illumination_mode {
        IlluminationMode::Generalized => nd
            .iter()
            .zip(illumination)
            .zip(&dnd)
            .map(|((&n, &g), &d)| n * w / (g * params.wafer_optical_const - w * d))
            .collect(),
        IlluminationMode::Transient => nd.iter().zip(&dnd).map(|(&n, &d)| -n / d).collect(),
    };
    Ok(tau)
}

/// Illumination intensity (suns) implied by the recombination rate.
pub fn implied_suns(nd: &[f64], tau: &[f64], thickness: f64, optical_const: f64) -> Vec<f64> {
    nd.iter()
        .zip(tau)
        .map(|(&n, &t)| n * thickness * Q / (ONE_SUN_CURRENT * optical_const * t))
        .collect()
}

/// Implied Voc at one sun.
///
/// Takes the last sample at or above one sun. When the trace never reaches
/// one sun, extrapolates a line of iVoc against `ln(suns)` to `ln(suns) = 0`
/// using samples with `ln(suns) > -5`.
pub fn one_sun_voc(implied_suns: &[f64], implied_voc: &[f64]) -> Result<f64> {
    if let Some(k) = implied_suns.iter().rposition(|&s| s >= 1.0) {
        return Ok(implied_voc[k]);
    }

    let (x, y): (Vec<f64>, Vec<f64>) = implied_suns
        .iter()
        .zip(implied_voc)
        .filter(|&(&s, _)| s > 0.0 && s.ln() > -5.0)
        .map(|(&s, &v)| (s.ln(), v))
        .unzip();
    let line = linear_regression(&x, &y)?;
    debug!(
        "one-sun iVoc extrapolated from {} samples (R^2 = {:.4})",
        x.len(),
        line.r_squared
    );
    Ok(line.intercept)
}

/// Cut the flash rise and the noise tail from a raw record.
///
/// Drops samples at `time <= 0` or below the noise floor, then everything
/// up to the last sample still rising above `rise_threshold`, then
/// everything up to the last sample of negative curvature before the
/// curvature peak.
pub fn trim_transient(
    record: &PhotoconductanceRecord,
    config: &PhotoconductanceConfig,
) -> Result<PhotoconductanceRecord> {
    let keep: Vec<usize> = (0..record.time.len())
        .filter(|&i| record.time[i] > 0.0 && record.conductance[i] > config.noise_floor)
        .collect();
    if keep.is_empty() {
        return Err(InputError::TooFewSamples {
            context: "conductance above the noise floor",
            required: 1,
            actual: 0,
        }
        .into());
    }
    let pick = |values: &[f64]| keep.iter().map(|&i| values[i]).collect::<Vec<_>>();
    let mut time = pick(&record.time);
    let mut conductance = pick(&record.conductance);
    let mut illumination = pick(&record.illumination);

    let slope = config.trim_filter.with_deriv(1).apply(&conductance)?;
    let mut curvature = config.trim_filter.with_deriv(2).apply(&conductance)?;

    if let Some(last) = (0..conductance.len())
        .rev()
        .find(|&i| conductance[i] > config.rise_threshold && slope[i] > 0.0)
    {
        let start = last + 1;
        time.drain(..start);
        conductance.drain(..start);
        illumination.drain(..start);
        curvature.drain(..start);
    }

    let Some(peak) = first_argmax(&curvature) else {
        return Err(InputError::TooFewSamples {
            context: "conductance after the flash",
            required: 1,
            actual: 0,
        }
        .into());
    };
    if let Some(last) = (0..time.len())
        .rev()
        .find(|&i| curvature[i] < 0.0 && time[i] < time[peak])
    {
        let start = last + 1;
        time.drain(..start);
        conductance.drain(..start);
        illumination.drain(..start);
    }

    debug!(
        "trimmed photoconductance trace from {} to {} samples",
        record.time.len(),
        time.len()
    );

    Ok(PhotoconductanceRecord {
        time,
        conductance,
        illumination,
        params: record.params.clone(),
        dark_conductance: record.dark_conductance,
    })
}

fn first_argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Derive the injection-dependent lifetime and implied Voc from a raw
/// photoconductance record.
///
/// # Errors
/// - [`crate::Error::Input`] for a malformed record, a trace too short for
///   the filters, or non-positive conductance after trimming
/// - [`crate::Error::Domain`] when the carrier physics is out of domain
pub fn process_photoconductance(
    record: &PhotoconductanceRecord,
    config: &PhotoconductanceConfig,
) -> Result<PhotoconductanceResult> {
    record.validate()?;
    let trimmed = if config.trim {
        trim_transient(record, config)?
    } else {
        record.clone()
    };
    if let Some(&value) = trimmed.conductance.iter().find(|&&c| c <= 0.0) {
        return Err(InputError::InvalidValue {
            field: "conductance",
            value,
        }
        .into());
    }

    let params = &trimmed.params;
    let wafer = WaferState::from_resistivity(
        params.temperature,
        params.wafer_thickness,
        params.wafer_doping_type,
        params.wafer_resistivity,
        config.fixed_point,
    )?;

    let nd = charge_density(
        wafer.majority_doping(),
        params.wafer_thickness,
        &trimmed.conductance,
    );
    let tau = derive_lifetime(
        &trimmed.time,
        &nd,
        &trimmed.illumination,
        params,
        &config.lifetime_filter,
    )?;
    let suns = implied_suns(
        &nd,
        &tau,
        params.wafer_thickness,
        params.wafer_optical_const,
    );

    let profile = wafer.injection_profile(&nd)?;
    let voc_curve = nd
        .iter()
        .zip(&profile.n_i_eff)
        .map(|(&dn, &n_i_eff)| wafer.implied_voc(dn, n_i_eff))
        .collect::<pvlife_physics::Result<Vec<_>>>()?;
    let implied_voc = one_sun_voc(&suns, &voc_curve)?;

    let calc_wafer_resistivity = match trimmed.dark_conductance {
        Some(g) if g > 0.0 => Some(params.wafer_thickness / g),
        Some(g) => {
            warn!("ignoring non-positive dark conductance {}", g);
            None
        }
        None => None,
    };

    info!(
        "photoconductance: {} samples, N_M = {:.3e} cm^-3, 1-sun iVoc = {:.4} V",
        nd.len(),
        wafer.majority_doping(),
        implied_voc
    );

    Ok(PhotoconductanceResult {
        doping: wafer.doping,
        temperature: params.temperature,
        wafer_thickness: params.wafer_thickness,
        time: trimmed.time,
        nd,
        tau,
        implied_suns: suns,
        n_i_eff: profile.n_i_eff,
        implied_voc_curve: voc_curve,
        implied_voc,
        calc_wafer_resistivity,
        unconverged_samples: profile.unconverged.len(),
    })
}
