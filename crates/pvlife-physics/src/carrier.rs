//! Total carrier concentrations from doping and excess density.

use pvlife_core::Doping;

/// Electron and hole concentrations (cm^-3).
///
/// Assumes full ionisation of the net doping `N_D - N_A` and solves the law
/// of mass action `n_0 p_0 = n_i^2` for the majority carrier, choosing the
/// n-type branch when the net doping is non-negative. The excess densities
/// `dn`, `dp` are then added to the equilibrium values.
pub fn carrier_densities(doping: &Doping, dn: f64, dp: f64, n_i: f64) -> (f64, f64) {
    let half_net = doping.net() / 2.0;
    let root = (half_net * half_net + n_i * n_i).sqrt();

    let (n_0, p_0) = if half_net >= 0.0 {
        let n_0 = half_net + root;
        (n_0, n_i * n_i / n_0)
    } else {
        let p_0 = -half_net + root;
        (n_i * n_i / p_0, p_0)
    };

    (n_0 + dn, p_0 + dp)
}
