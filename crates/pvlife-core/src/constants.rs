//! Physical constants.
//!
//! One table for the whole workspace. Values match the empirical silicon
//! models they feed, so they are not the CODATA 2018 exact values.

/// Boltzmann constant (J/K).
pub const K_B: f64 = 1.38065e-23;

/// Boltzmann constant (eV/K).
pub const K_B_EV: f64 = 8.61733e-5;

/// Elementary charge (C).
pub const Q: f64 = 1.602176e-19;

/// Electron rest mass (kg).
pub const M_0: f64 = 9.10938e-31;

/// Planck constant (eV s).
pub const H_EV: f64 = 4.1357e-15;

/// Speed of light (m/s).
pub const C_LIGHT: f64 = 2.9979e8;

/// Thermal voltage kT/q (V) at the given temperature (K).
#[inline]
pub fn thermal_voltage(temp_k: f64) -> f64 {
    K_B * temp_k / Q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thermal_voltage_room_temperature() {
        let vt = thermal_voltage(300.0);
        assert!((vt - 0.025852).abs() < 1e-5, "Vt = {} (expected ≈ 0.025852)", vt);
    }

    #[test]
    fn test_boltzmann_units_agree() {
        // k_B [J/K] / q == k_B [eV/K] to the precision of the table.
        let derived = K_B / Q;
        assert!((derived - K_B_EV).abs() / K_B_EV < 1e-5);
    }
}
