//! Recombination lifetime models.
//!
//! Every model is a closed-form function of the carrier state for a single
//! excess density sample. Lifetimes are in seconds, densities in cm^-3.

use pvlife_core::constants::Q;

use crate::error::{Error, Result, require_positive};

/// Richter 2012 Auger coefficients (cm^6/s).
const C_N: f64 = 8.5e-32;
const C_P: f64 = 2.5e-31;
const C_A: f64 = 3.0e-29;

/// Low-injection radiative coefficient (cm^3/s), Trupke 2003.
const B_LOW: f64 = 4.73e-15;

/// Excess `n p - n_i_eff^2` product, which must be positive under injection.
fn excess_product(n: f64, p: f64, n_i_eff: f64) -> Result<f64> {
    let excess = n * p - n_i_eff * n_i_eff;
    if excess.is_finite() && excess > 0.0 {
        Ok(excess)
    } else {
        Err(Error::domain(
            "n p - n_i_eff^2",
            excess,
            "recombination needs a positive excess product",
        ))
    }
}

/// Intrinsic Auger lifetime, Richter et al. 2012.
///
/// Coulomb-enhanced electron-electron-hole and electron-hole-hole terms plus
/// the ambipolar term, summed as rates. The parameterisation is calibrated at
/// 300 K; other temperatures are evaluated without complaint.
pub fn tau_auger(
    dn: f64,
    n: f64,
    p: f64,
    n_0: f64,
    p_0: f64,
    n_i_eff: f64,
    temp: f64,
) -> Result<f64> {
    require_positive("dn", dn)?;
    let excess = excess_product(n, p, n_i_eff)? / dn;

    let g_max_n = 235548.0 * temp.powf(-1.5013);
    let g_max_p = 564812.0 * temp.powf(-1.6546);
    let g_eeh = 1.0 + (g_max_n - 1.0) * (1.0 - (n_0 / 3.3e17).powf(0.66).tanh());
    let g_ehh = 1.0 + (g_max_p - 1.0) * (1.0 - (p_0 / 7.0e17).powf(0.63).tanh());

    let rate = C_N * g_eeh * n_0 * excess
        + C_P * g_ehh * p_0 * excess
        + C_A * dn.powf(0.92) * excess;

    require_positive("Auger lifetime", 1.0 / rate)
}

/// Radiative lifetime with the injection and temperature dependent relative
/// coefficient of Altermatt et al. 2005.
pub fn tau_radiative(dn: f64, n: f64, p: f64, n_i_eff: f64, temp: f64) -> Result<f64> {
    require_positive("dn", dn)?;
    let excess = excess_product(n, p, n_i_eff)?;

    let (b_max, r_max, s_max, w_max) = (1.0, 0.2, 1.5e18, 4.0e18);
    let (r_min, s_min, w_min) = (0.0, 1e7, 1e9);
    let (b_2, b_4) = (0.54, 1.25);
    let (r_1, s_1, w_1) = (320.0, 550.0, 365.0);
    let (r_2, s_2, w_2) = (2.5, 3.0, 3.54);

    let b_1 = s_max + (s_min - s_max) / (1.0 + (temp / s_1).powf(s_2));
    let b_3 = w_max + (w_min - w_max) / (1.0 + (temp / w_1).powf(w_2));
    let b_min = r_max + (r_min - r_max) / (1.0 + (temp / r_1).powf(r_2));

    let total = n + p;
    let b_rel =
        b_min + (b_max - b_min) / (1.0 + (total / b_1).powf(b_2) + (total / b_3).powf(b_4));

    require_positive("radiative lifetime", dn / (b_rel * B_LOW * excess))
}

/// Surface recombination lifetime for a symmetric wafer with recombination
/// current prefactor `j_0` (A/cm^2) per surface and thickness `w` (cm).
///
/// `tau = W q n_i_eff^2 / (J_0 (N_M + dn))`.
#[inline]
pub fn tau_surface(dn: f64, j_0: f64, n_m: f64, n_i_eff: f64, w: f64) -> f64 {
    w * Q * n_i_eff * n_i_eff / (j_0 * (n_m + dn))
}

/// Simplified Shockley-Read-Hall lifetime.
///
/// Interpolates from the minority lifetime `t_m0` at low injection towards
/// `t_m0 + t_big_m0` at high injection.
#[inline]
pub fn tau_srh(dn: f64, n_m: f64, t_m0: f64, t_big_m0: f64) -> f64 {
    t_m0 + t_big_m0 * dn / (dn + n_m)
}

/// Harmonic combination `(sum 1/tau_k)^-1` of component lifetimes.
///
/// Never exceeds the smallest component.
pub fn effective_lifetime<I>(components: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let inverse: f64 = components.into_iter().map(|tau| 1.0 / tau).sum();
    1.0 / inverse
}
