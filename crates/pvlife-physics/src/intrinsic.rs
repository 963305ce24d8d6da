//! Intrinsic silicon properties as functions of temperature.

use std::f64::consts::PI;

use pvlife_core::constants::{K_B, K_B_EV, M_0};
use pvlife_core::thermal_voltage;
use serde::{Deserialize, Serialize};

use crate::error::{Result, require_positive};

/// Bandgap of silicon at 0 K (eV).
pub const E_G_0: f64 = 1.17;

/// Temperature-only silicon parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicParams {
    /// Conduction band effective density of states (cm^-3).
    pub n_c: f64,
    /// Valence band effective density of states (cm^-3).
    pub n_v: f64,
    /// Intrinsic bandgap (eV).
    pub e_g: f64,
    /// Intrinsic Fermi level above the valence band edge (eV).
    pub e_f: f64,
    /// Conduction band edge relative to the intrinsic Fermi level (eV).
    pub e_c: f64,
    /// Valence band edge relative to the intrinsic Fermi level (eV).
    pub e_v: f64,
    /// Intrinsic carrier density (cm^-3).
    pub n_i: f64,
}

impl IntrinsicParams {
    /// Evaluate every intrinsic quantity at `temp` (K).
    pub fn at(temp: f64) -> Result<Self> {
        require_positive("temperature", temp)?;
        let (n_c, n_v) = density_of_states(temp);
        let e_g = bandgap(temp, E_G_0);
        let n_i = intrinsic_density(n_c, n_v, e_g, temp);
        let (e_f, e_c, e_v) = intrinsic_fermi_level(n_c, n_v, e_g, temp);

        Ok(Self {
            n_c,
            n_v,
            e_g,
            e_f,
            e_c,
            e_v,
            n_i,
        })
    }
}

/// Effective conduction and valence band densities of states (cm^-3).
///
/// Cubic effective-mass fit of Couderc, J. Appl. Phys. 2014; validated up
/// to 500 K.
pub fn density_of_states(temp: f64) -> (f64, f64) {
    const A_C: [f64; 4] = [-4.609e-10, 6.753e-7, -1.312e-5, 1.094e+0];
    const A_V: [f64; 4] = [2.525e-9, -4.689e-6, 3.376e-3, 3.426e-1];

    let dos = |a: &[f64; 4]| {
        let m = a[0] * temp.powi(3) + a[1] * temp.powi(2) + a[2] * temp + a[3];
        4.83e15 * m * temp.powf(1.5)
    };

    (dos(&A_C), dos(&A_V))
}

/// Temperature-dependent intrinsic bandgap (eV).
///
/// Paessler, Phys. Rev. B 2002. Validated up to about 415 K; values
/// outside that range are returned unchecked.
pub fn bandgap(temp: f64, e_g_0: f64) -> f64 {
    let alpha = 3.23e-4;
    let theta = 4.46e+2;
    let delta: f64 = 5.10e-1;
    let delta_sq = delta * delta;

    let gamma = (1.0 - 3.0 * delta_sq) / ((theta / temp).exp() - 1.0);
    let chi = 2.0 * temp / theta;

    let poly = 1.0
        + (PI * PI / (3.0 * (1.0 + delta_sq))) * chi.powi(2)
        + ((3.0 * delta_sq - 1.0) / 4.0) * chi.powi(3)
        + (8.0 / 3.0) * chi.powi(4)
        + chi.powi(6);

    let shift = alpha * theta * (gamma + 1.5 * delta_sq * (poly.powf(1.0 / 6.0) - 1.0));

    e_g_0 - shift
}

/// Intrinsic carrier density `sqrt(N_c N_v exp(-E_g / kT))` (cm^-3).
pub fn intrinsic_density(n_c: f64, n_v: f64, e_g: f64, temp: f64) -> f64 {
    (n_c * n_v * (-e_g / (K_B_EV * temp)).exp()).sqrt()
}

/// Intrinsic Fermi level and the band edges relative to it (eV).
///
/// Returns `(E_f_i, E_c_i, E_v_i)`.
pub fn intrinsic_fermi_level(n_c: f64, n_v: f64, e_g: f64, temp: f64) -> (f64, f64, f64) {
    let e_f = e_g / 2.0 + (thermal_voltage(temp) / 2.0) * (n_c / n_v).ln();
    (e_f, e_g - e_f, -e_f)
}

/// Electron and hole thermal velocities (cm/s).
///
/// Conduction band thermal mass after Green 1990, valence band after
/// Lang 1981.
pub fn thermal_velocity(temp: f64) -> Result<(f64, f64)> {
    require_positive("temperature", temp)?;

    let m_l = 0.9163;
    let (a, b, c) = (1.1785, -9.025e-5, -3.05e-7);
    let e_g_t = a + b * temp + c * temp * temp;
    let m_t = 0.1905 * a / e_g_t;
    let delta = ((m_l - m_t) / m_l).sqrt();
    let m_tc = 4.0 * m_l / (1.0 + (m_l / m_t).sqrt() * delta.asin() / delta).powi(2);
    let v_e = (8.0 * K_B * temp / (PI * m_tc * M_0)).sqrt() * 100.0;

    let num = 0.443587 + 3.609528e-3 * temp + 1.173515e-4 * temp.powi(2)
        + 1.263218e-6 * temp.powi(3)
        + 3.025581e-9 * temp.powi(4);
    let den = 1.0 + 4.683382e-3 * temp + 2.286895e-4 * temp.powi(2)
        + 7.469271e-7 * temp.powi(3)
        + 1.727481e-9 * temp.powi(4);
    let m_dv = (num / den).powf(2.0 / 3.0);
    let v_h = (8.0 * K_B * temp / (PI * m_dv * M_0)).sqrt() * 100.0;

    Ok((v_e, v_h))
}
