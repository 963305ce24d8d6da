//! Self-consistent equilibrium carrier densities.
//!
//! In the dark the effective intrinsic density depends on bandgap narrowing
//! and degeneracy, which in turn depend on the carrier densities it sets.
//! [`solve_equilibrium`] resolves this loop by fixed-point iteration.

use log::warn;
use pvlife_core::{Doping, thermal_voltage};
use serde::{Deserialize, Serialize};

use crate::bandgap::bandgap_narrowing;
use crate::carrier::carrier_densities;
use crate::error::{Result, require_positive};
use crate::fermi::{degeneracy_factor, fermi_half, inverse_fermi_half};
use crate::fixed_point::{FixedPointCriteria, FixedPointReport, iterate};
use crate::intrinsic::IntrinsicParams;

/// Converged equilibrium state of a doped wafer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumState {
    /// Equilibrium electron density (cm^-3).
    pub n_0: f64,
    /// Equilibrium hole density (cm^-3).
    pub p_0: f64,
    /// Effective intrinsic carrier density (cm^-3).
    pub n_i_0: f64,
    pub report: FixedPointReport,
}

/// Equilibrium Fermi level (eV) from Fermi-Dirac statistics.
///
/// `e_c_0`, `e_v_0` are the narrowed band edges relative to the intrinsic
/// Fermi level.
pub fn equilibrium_fermi_level(
    e_c_0: f64,
    e_v_0: f64,
    n_0: f64,
    p_0: f64,
    temp: f64,
    n_c: f64,
    n_v: f64,
) -> Result<f64> {
    let inv_n = inverse_fermi_half(require_positive("n_0", n_0)? / n_c)?;
    let inv_p = inverse_fermi_half(require_positive("p_0", p_0)? / n_v)?;

    Ok(((inv_n - inv_p) * thermal_voltage(temp) + (e_c_0 + e_v_0)) / 2.0)
}

/// Equilibrium bandgap narrowing correction factor for `n_i`.
pub fn equilibrium_bgn_factor(
    n_c: f64,
    n_v: f64,
    n_0: f64,
    p_0: f64,
    temp: f64,
    de_c_0: f64,
    de_v_0: f64,
) -> Result<f64> {
    let vt = thermal_voltage(temp);
    let occ_n = require_positive("n_0", n_0)? / n_c;
    let occ_p = require_positive("p_0", p_0)? / n_v;

    let f_n = fermi_half(de_c_0 / vt + inverse_fermi_half(occ_n)?);
    let f_p = fermi_half(de_v_0 / vt + inverse_fermi_half(occ_p)?);

    Ok(f_n * f_p / (occ_n * occ_p))
}

/// Solve for `(n_0, p_0, n_i_0)` at zero excess carrier density.
///
/// Starts from the intrinsic density and updates
/// `n_i_0 = sqrt(n_i^2 gamma_bgn_0 gamma_degen_0)`. Hitting the iteration cap
/// returns the last estimate with `report.converged == false` and a warning.
pub fn solve_equilibrium(
    doping: &Doping,
    temp: f64,
    intrinsic: &IntrinsicParams,
    criteria: &FixedPointCriteria,
) -> Result<EquilibriumState> {
    doping.validate()?;
    let n_i = intrinsic.n_i;

    let (n_i_0, report) = iterate(n_i, criteria, |n_i_0| {
        let (n_0, p_0) = carrier_densities(doping, 0.0, 0.0, n_i_0);
        let shift = bandgap_narrowing(doping, n_0, p_0, temp)?;

        let gamma_bgn = equilibrium_bgn_factor(
            intrinsic.n_c,
            intrinsic.n_v,
            n_0,
            p_0,
            temp,
            shift.de_c,
            shift.de_v,
        )?;

        let e_c_0 = intrinsic.e_c - shift.de_c;
        let e_v_0 = intrinsic.e_v + shift.de_v;
        let e_f_0 =
            equilibrium_fermi_level(e_c_0, e_v_0, n_0, p_0, temp, intrinsic.n_c, intrinsic.n_v)?;
        let gamma_degen = degeneracy_factor(e_c_0, e_v_0, e_f_0, e_f_0, temp)?;

        Ok((n_i * n_i * gamma_bgn * gamma_degen).sqrt())
    })?;

    if !report.converged {
        warn!(
            "equilibrium n_i did not converge after {} iterations (rel change {:.3e}) for N_D = {:.3e}, N_A = {:.3e}",
            report.iterations, report.rel_change, doping.n_d, doping.n_a
        );
    }

    let (n_0, p_0) = carrier_densities(doping, 0.0, 0.0, n_i_0);

    Ok(EquilibriumState {
        n_0,
        p_0,
        n_i_0,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgn_factor_is_one_without_shift() {
        let p = IntrinsicParams::at(300.0).unwrap();
        let gamma = equilibrium_bgn_factor(p.n_c, p.n_v, 1e15, 1e15, 300.0, 0.0, 0.0).unwrap();
        assert!((gamma - 1.0).abs() < 1e-3, "gamma = {}", gamma);
    }

    #[test]
    fn test_bgn_factor_grows_with_shift() {
        let p = IntrinsicParams::at(300.0).unwrap();
        let gamma = equilibrium_bgn_factor(p.n_c, p.n_v, 1e15, 1e15, 300.0, 0.01, 0.01).unwrap();
        // exp(0.02 / Vt) in the Boltzmann limit
        let expected = (0.02 / thermal_voltage(300.0)).exp();
        assert!((gamma / expected - 1.0).abs() < 1e-2, "{} vs {}", gamma, expected);
    }

    #[test]
    fn test_fermi_level_above_midgap_for_n_type() {
        let p = IntrinsicParams::at(300.0).unwrap();
        let e_f = equilibrium_fermi_level(p.e_c, p.e_v, 1e15, 1e5, 300.0, p.n_c, p.n_v).unwrap();
        assert!(e_f > 0.0 && e_f < p.e_c, "E_f = {}", e_f);
    }

    #[test]
    fn test_cap_is_reported_not_raised() {
        let p = IntrinsicParams::at(298.15).unwrap();
        let criteria = FixedPointCriteria::default().with_max_iterations(1);
        let state = solve_equilibrium(&Doping::donors(1e15), 298.15, &p, &criteria).unwrap();
        assert!(!state.report.converged);
        assert_eq!(state.report.iterations, 1);
        assert!(state.n_i_0 > p.n_i);
    }
}
