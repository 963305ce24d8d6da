//! Effective lifetime from a Suns-Voc photovoltage transient.
//!
//! The open-circuit voltage fixes the np product, so the excess density
//! follows from the quadratic `dn (N_M + dn) = n_i_eff^2 exp(V / V_T)`.
//! Because `n_i_eff` itself depends on `dn` through bandgap narrowing, the
//! two are solved together per sample. The lifetime then comes from the
//! same generalized or transient analysis used for photoconductance.

use log::{info, warn};
use pvlife_core::{InputError, SunsVocRecord, thermal_voltage};
use pvlife_physics::WaferState;
use pvlife_physics::fixed_point::iterate;

use crate::error::Result;
use crate::photoconductance::{
    PhotoconductanceConfig, PhotoconductanceResult, derive_lifetime, implied_suns, one_sun_voc,
};

/// Excess carrier density (cm^-3) at open-circuit photovoltage `voltage` (V).
pub fn charge_density_from_voltage(n_m: f64, n_i_eff: f64, temperature: f64, voltage: f64) -> f64 {
    let x = 4.0 * n_i_eff * n_i_eff * (voltage / thermal_voltage(temperature)).exp();
    // Rationalised root of (sqrt(N_M^2 + x) - N_M) / 2; no cancellation at low injection.
    x / (2.0 * ((n_m * n_m + x).sqrt() + n_m))
}

/// Derive the injection-dependent lifetime and implied Voc from a raw
/// Suns-Voc record.
///
/// The trace is used as recorded; photovoltage has no flash-rise or noise
/// trimming, so `config.trim` and its thresholds are ignored.
///
/// # Errors
/// - [`crate::Error::Input`] for a malformed record, a trace too short for
///   the lifetime filter, or a non-positive photovoltage
/// - [`crate::Error::Domain`] when the carrier physics is out of domain
pub fn process_suns_voc(
    record: &SunsVocRecord,
    config: &PhotoconductanceConfig,
) -> Result<PhotoconductanceResult> {
    record.validate()?;
    if let Some(&value) = record.voltage.iter().find(|&&v| v <= 0.0) {
        return Err(InputError::InvalidValue {
            field: "voltage",
            value,
        }
        .into());
    }

    let params = &record.params;
    let wafer = WaferState::from_resistivity(
        params.temperature,
        params.wafer_thickness,
        params.wafer_doping_type,
        params.wafer_resistivity,
        config.fixed_point,
    )?;
    let n_m = wafer.majority_doping();

    let mut nd = Vec::with_capacity(record.voltage.len());
    let mut n_i_eff = Vec::with_capacity(record.voltage.len());
    let mut unconverged = 0;
    for &voltage in &record.voltage {
        let density = |n_i: f64| charge_density_from_voltage(n_m, n_i, params.temperature, voltage);
        let (n_i, report) = iterate(wafer.equilibrium.n_i_0, &config.fixed_point, |n_i| {
            Ok(wafer.steady_state(density(n_i))?.n_i_eff)
        })?;
        if !report.converged {
            unconverged += 1;
        }
        nd.push(density(n_i));
        n_i_eff.push(n_i);
    }
    if unconverged > 0 {
        warn!(
            "{} of {} photovoltage samples hit the fixed-point cap",
            unconverged,
            nd.len()
        );
    }

    let tau = derive_lifetime(
        &record.time,
        &nd,
        &record.illumination,
        params,
        &config.lifetime_filter,
    )?;
    let suns = implied_suns(
        &nd,
        &tau,
        params.wafer_thickness,
        params.wafer_optical_const,
    );
    let voc_curve = nd
        .iter()
        .zip(&n_i_eff)
        .map(|(&dn, &n_i)| wafer.implied_voc(dn, n_i))
        .collect::<pvlife_physics::Result<Vec<_>>>()?;
    let implied_voc = one_sun_voc(&suns, &voc_curve)?;

    info!(
        "suns-voc: {} samples, N_M = {:.3e} cm^-3, 1-sun iVoc = {:.4} V",
        nd.len(),
        n_m,
        implied_voc
    );

    Ok(PhotoconductanceResult {
        doping: wafer.doping,
        temperature: params.temperature,
        wafer_thickness: params.wafer_thickness,
        time: record.time.clone(),
        nd,
        tau,
        implied_suns: suns,
        n_i_eff,
        implied_voc_curve: voc_curve,
        implied_voc,
        calc_wafer_resistivity: None,
        unconverged_samples: unconverged,
    })
}
