//! Many-body bandgap narrowing.
//!
//! Analytical model of Schenk, J. Appl. Phys. 84 (1998), in the
//! implementation of McIntosh and Altermatt (2010). The conduction and
//! valence band shifts each combine a rigid exchange-correlation term and an
//! ionic term, both as Padé approximations in the dimensionless carrier
//! densities `n a_ex^3` and reduced temperature `kT / Ry_ex`.

use std::f64::consts::PI;

use pvlife_core::{Doping, thermal_voltage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, require_positive};

/// Electron density-of-states effective mass (units of m_0).
const M_E: f64 = 0.321;
/// Hole density-of-states effective mass (units of m_0).
const M_H: f64 = 0.346;
/// Reduced effective mass (units of m_0).
const MU_STAR: f64 = 0.1665;
/// Excitonic Rydberg (eV).
const RY_EX: f64 = 16.55e-3;
/// Excitonic Bohr radius (cm).
const A_EX: f64 = 3.719e-7;
/// Conduction band valley degeneracy.
const G_E: f64 = 12.0;
/// Valence band degeneracy.
const G_H: f64 = 4.0;

/// Padé coefficients of one band.
struct BandCoeffs {
    /// Degeneracy factor `g`.
    g: f64,
    /// Mass ratio `mu* / m`.
    alpha: f64,
    // ionic term
    h: f64,
    j: f64,
    k: f64,
    q: f64,
    // exchange-correlation term
    b: f64,
    c: f64,
    d: f64,
    p: f64,
}

const ELECTRON: BandCoeffs = BandCoeffs {
    g: G_E,
    alpha: MU_STAR / M_E,
    h: 3.91,
    j: 2.8585,
    k: 0.012,
    q: 3.0 / 4.0,
    b: 8.0,
    c: 1.3346,
    d: 0.893,
    p: 7.0 / 30.0,
};

const HOLE: BandCoeffs = BandCoeffs {
    g: G_H,
    alpha: MU_STAR / M_H,
    h: 4.2,
    j: 2.9307,
    k: 0.19,
    q: 1.0 / 4.0,
    b: 1.0,
    c: 1.2365,
    d: 1.153,
    p: 7.0 / 30.0,
};

/// Band edge shifts due to bandgap narrowing (eV, all positive for narrowing).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandgapShift {
    /// Total narrowing `dE_c + dE_v`.
    pub de_g: f64,
    /// Downward shift of the conduction band edge.
    pub de_c: f64,
    /// Upward shift of the valence band edge.
    pub de_v: f64,
}

/// Dimensionless quantities shared by both band terms.
struct Reduced {
    /// Electron density in units of `a_ex^-3`.
    n_e: f64,
    /// Hole density in units of `a_ex^-3`.
    n_h: f64,
    n_sum: f64,
    /// Mass-weighted density `alpha_e n_e + alpha_h n_h`.
    n_p: f64,
    /// Ionised dopant density in units of `a_ex^-3`.
    n_ion: f64,
    /// Reduced temperature `kT / Ry_ex`.
    t: f64,
}

/// Bandgap narrowing for the given doping, carrier densities (cm^-3) and
/// temperature (K).
pub fn bandgap_narrowing(doping: &Doping, n: f64, p: f64, temp: f64) -> Result<BandgapShift> {
    require_positive("n", n)?;
    require_positive("p", p)?;
    require_positive("temperature", temp)?;

    let a3 = A_EX.powi(3);
    let n_e = n * a3;
    let n_h = p * a3;
    let reduced = Reduced {
        n_e,
        n_h,
        n_sum: n_e + n_h,
        n_p: ELECTRON.alpha * n_e + HOLE.alpha * n_h,
        n_ion: doping.total() * a3,
        t: thermal_voltage(temp) / RY_EX,
    };

    let de_c = -RY_EX * (exchange_correlation(&reduced, reduced.n_e, &ELECTRON)
        + ionic(&reduced, &ELECTRON));
    let de_v = -RY_EX * (exchange_correlation(&reduced, reduced.n_h, &HOLE)
        + ionic(&reduced, &HOLE));

    Ok(BandgapShift {
        de_g: de_c + de_v,
        de_c,
        de_v,
    })
}

/// Rigid exchange-correlation shift in units of `Ry_ex` (negative).
fn exchange_correlation(r: &Reduced, n_x: f64, c: &BandCoeffs) -> f64 {
    let four_pi_cubed = (4.0 * PI).powi(3);
    let n_sum_sq = r.n_sum * r.n_sum;

    let num = four_pi_cubed
        * n_sum_sq
        * ((48.0 * n_x / (PI * c.g)).cbrt() + c.c * (1.0 + c.d * r.n_p.powf(c.p)).ln())
        + 8.0 * PI * c.alpha * n_x * r.t.powi(2) / c.g
        + (8.0 * PI * r.n_sum).sqrt() * r.t.powf(2.5);
    let den = four_pi_cubed * n_sum_sq
        + r.t.powi(3)
        + c.b * r.n_sum.sqrt() * r.t.powi(2)
        + 40.0 * r.n_sum.powf(1.5) * r.t;

    -num / den
}

/// Ionic (carrier-dopant) shift in units of `Ry_ex` (negative).
fn ionic(r: &Reduced, c: &BandCoeffs) -> f64 {
    let u = r.n_sum * r.n_sum / r.t.powi(3);

    let screening = (r.t * r.n_sum / (2.0 * PI)).sqrt()
        * (1.0 + c.h * (1.0 + r.n_sum.sqrt() / r.t).ln())
        + c.j * u * r.n_p.powf(0.75) * (1.0 + c.k * r.n_p.powf(c.q));

    -r.n_ion * (1.0 + u) / screening
}
