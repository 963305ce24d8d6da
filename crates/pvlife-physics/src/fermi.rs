//! Fermi-Dirac statistics.
//!
//! Closed-form approximations of the Fermi integral of order 1/2 and its
//! inverse (Unger, Phys. Stat. Sol. 1988), plus the Fermi levels and
//! degeneracy factor built on them. Energies are in eV relative to the
//! intrinsic Fermi level; reduced energies `eta` are in units of kT/q.

use std::f64::consts::PI;

use pvlife_core::thermal_voltage;

use crate::error::{Error, Result, require_positive};

/// Below this fractional occupation the inverse uses the Boltzmann limit.
pub const INV_LOW_BRANCH: f64 = 1e-2;
/// Above this fractional occupation the inverse uses the asymptotic form.
pub const INV_HIGH_BRANCH: f64 = 4.475;
/// Regularizer added inside the Boltzmann-limit logarithm.
pub const INV_REGULARIZER: f64 = 1e-16;

/// Approximate Fermi integral of order 1/2.
///
/// `z + 0.1535 z^2` with `z = ln(1 + e^eta)` for `eta <= 3`, and the
/// asymptotic `(4 / (3 sqrt(pi))) (eta^2 + 1.7788)^(3/4)` above.
pub fn fermi_half(eta: f64) -> f64 {
    if eta <= 3.0 {
        // ln_1p keeps full precision where e^eta is far below one.
        let z = eta.exp().ln_1p();
        z + 0.1535 * z * z
    } else {
        (4.0 / (3.0 * PI.sqrt())) * (eta * eta + 1.7788).powf(0.75)
    }
}

/// Approximate inverse of [`fermi_half`].
///
/// Three branches split at [`INV_LOW_BRANCH`] and [`INV_HIGH_BRANCH`]. The
/// caller must pass a positive occupation; anything at or below
/// `-INV_REGULARIZER` is a domain error.
pub fn inverse_fermi_half(f: f64) -> Result<f64> {
    if f.is_nan() || f + INV_REGULARIZER <= 0.0 {
        return Err(Error::domain(
            "fermi occupation",
            f,
            "inverse Fermi integral needs a positive occupation",
        ));
    }

    let eta = if f < INV_LOW_BRANCH {
        (f + INV_REGULARIZER).ln()
    } else if f <= INV_HIGH_BRANCH {
        (-1.0 + ((-1.0 + (1.0 + 0.614 * f).sqrt()) / 0.307).exp()).ln()
    } else {
        (((0.75 * f * PI.sqrt()).powf(4.0 / 3.0)) - 1.7788).sqrt()
    };

    if eta.is_finite() {
        Ok(eta)
    } else {
        Err(Error::domain("fermi occupation", f, "inverse is not finite"))
    }
}

/// Electron and hole quasi-Fermi levels (eV).
///
/// `e_c`, `e_v` are band edges relative to the intrinsic level, `n`, `p`
/// carrier densities and `n_c`, `n_v` the intrinsic band densities of states.
pub fn quasi_fermi_levels(
    e_c: f64,
    e_v: f64,
    n: f64,
    p: f64,
    temp: f64,
    n_c: f64,
    n_v: f64,
) -> Result<(f64, f64)> {
    let vt = thermal_voltage(temp);
    let inv_n = inverse_fermi_half(require_positive("n", n)? / n_c)?;
    let inv_p = inverse_fermi_half(require_positive("p", p)? / n_v)?;

    Ok((e_c + inv_n * vt, e_v - inv_p * vt))
}

/// Degeneracy correction factor.
///
/// Ratio of Fermi-Dirac to Boltzmann occupation for both carriers; tends to
/// one in the non-degenerate limit.
pub fn degeneracy_factor(e_c: f64, e_v: f64, e_f_n: f64, e_f_p: f64, temp: f64) -> Result<f64> {
    let vt = thermal_voltage(temp);
    let eta_p = -(e_f_p - e_v) / vt;
    let eta_n = -(e_c - e_f_n) / vt;

    let exp_p = eta_p.exp();
    let exp_n = eta_n.exp();
    if exp_p == 0.0 || exp_n == 0.0 {
        return Err(Error::domain(
            "reduced Fermi energy",
            eta_p.min(eta_n),
            "Boltzmann occupation underflows",
        ));
    }

    Ok((fermi_half(eta_p) / exp_p) * (fermi_half(eta_n) / exp_n))
}
