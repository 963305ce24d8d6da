//! Self-consistent carrier densities under illumination.
//!
//! Same loop as the equilibrium solver, but with separate electron and hole
//! quasi-Fermi levels and the non-equilibrium bandgap narrowing factor.

use log::warn;
use pvlife_core::{Doping, thermal_voltage};
use serde::{Deserialize, Serialize};

use crate::bandgap::bandgap_narrowing;
use crate::carrier::carrier_densities;
use crate::error::{Error, Result};
use crate::fermi::{degeneracy_factor, fermi_half, quasi_fermi_levels};
use crate::fixed_point::{FixedPointCriteria, FixedPointReport, iterate};
use crate::intrinsic::IntrinsicParams;

/// Converged non-equilibrium state for one excess carrier density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteadyState {
    /// Total electron density (cm^-3).
    pub n: f64,
    /// Total hole density (cm^-3).
    pub p: f64,
    /// Non-equilibrium effective intrinsic density (cm^-3).
    pub n_i_eff: f64,
    /// Quasi-Fermi level splitting factor at the converged state.
    pub gamma_noneq: f64,
    pub report: FixedPointReport,
}

/// Non-equilibrium bandgap narrowing correction factor.
///
/// Ratio of the Fermi integrals with and without the band edge shifts, for
/// electrons and holes, evaluated at the quasi-Fermi levels.
pub fn nonequilibrium_bgn_factor(
    de_c: f64,
    de_v: f64,
    e_c_i: f64,
    e_v_i: f64,
    e_f_n: f64,
    e_f_p: f64,
    temp: f64,
) -> f64 {
    let vt = thermal_voltage(temp);

    let f_n_bgn = fermi_half(-((e_c_i - de_c) - e_f_n) / vt);
    let f_n = fermi_half(-(e_c_i - e_f_n) / vt);

    let f_p_bgn = fermi_half(-(e_f_p - (e_v_i + de_v)) / vt);
    let f_p = fermi_half(-(e_f_p - e_v_i) / vt);

    (f_n_bgn / f_n) * (f_p_bgn / f_p)
}

/// Quasi-Fermi level splitting factor `exp(-(E_f_p - E_f_n) / V_T)`.
pub fn nonequilibrium_factor(e_f_n: f64, e_f_p: f64, temp: f64) -> f64 {
    (-(e_f_p - e_f_n) / thermal_voltage(temp)).exp()
}

/// Solve for `(n, p, n_i_eff)` at excess densities `dn`, `dp` (cm^-3).
///
/// Starts from the equilibrium effective intrinsic density `n_i_0`. The
/// iteration cap is reported through `report`, never raised.
pub fn solve_steady_state(
    doping: &Doping,
    temp: f64,
    intrinsic: &IntrinsicParams,
    n_i_0: f64,
    dn: f64,
    dp: f64,
    criteria: &FixedPointCriteria,
) -> Result<SteadyState> {
    if !(dn.is_finite() && dn >= 0.0) {
        return Err(Error::domain("dn", dn, "excess density must be finite and non-negative"));
    }
    if !(dp.is_finite() && dp >= 0.0) {
        return Err(Error::domain("dp", dp, "excess density must be finite and non-negative"));
    }

    let n_i = intrinsic.n_i;
    let mut gamma_noneq = 1.0;

    let (n_i_eff, report) = iterate(n_i_0, criteria, |n_i_eff| {
        let (n, p) = carrier_densities(doping, dn, dp, n_i_eff);
        let shift = bandgap_narrowing(doping, n, p, temp)?;

        let e_c = intrinsic.e_c - shift.de_c;
        let e_v = intrinsic.e_v + shift.de_v;
        let (e_f_n, e_f_p) =
            quasi_fermi_levels(e_c, e_v, n, p, temp, intrinsic.n_c, intrinsic.n_v)?;

        let gamma_bgn = nonequilibrium_bgn_factor(
            shift.de_c,
            shift.de_v,
            intrinsic.e_c,
            intrinsic.e_v,
            e_f_n,
            e_f_p,
            temp,
        );
        let gamma_degen = degeneracy_factor(e_c, e_v, e_f_n, e_f_p, temp)?;
        gamma_noneq = nonequilibrium_factor(e_f_n, e_f_p, temp);

        Ok((n_i * n_i * gamma_bgn * gamma_degen).sqrt())
    })?;

    if !report.converged {
        warn!(
            "non-equilibrium n_i_eff did not converge after {} iterations (rel change {:.3e}) at dn = {:.3e}",
            report.iterations, report.rel_change, dn
        );
    }

    let (n, p) = carrier_densities(doping, dn, dp, n_i_eff);

    Ok(SteadyState {
        n,
        p,
        n_i_eff,
        gamma_noneq,
        report,
    })
}
