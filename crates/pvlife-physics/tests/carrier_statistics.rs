//! Integration tests for the carrier statistics and recombination stack.

use pvlife_core::{Doping, DopingType};
use pvlife_physics::fermi::{fermi_half, inverse_fermi_half};
use pvlife_physics::{
    FixedPointCriteria, IntrinsicParams, WaferState, carrier_densities, doping_from_resistivity,
    effective_lifetime, solve_equilibrium, tau_srh, tau_surface,
};

const T: f64 = 298.15;

fn logspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    (0..num)
        .map(|i| 10f64.powf(start + (stop - start) * i as f64 / (num - 1) as f64))
        .collect()
}

#[test]
fn test_equilibrium_converges_for_typical_wafers() {
    let intrinsic = IntrinsicParams::at(T).unwrap();
    let criteria = FixedPointCriteria::default();

    for doping in [Doping::donors(1e15), Doping::acceptors(1e15)] {
        let eq = solve_equilibrium(&doping, T, &intrinsic, &criteria).unwrap();
        assert!(eq.report.converged, "{:?} did not converge", doping);
        assert!(eq.report.iterations <= 20);
        assert!(eq.report.rel_change <= 1e-4);

        let mass_action = eq.n_0 * eq.p_0 / (eq.n_i_0 * eq.n_i_0);
        assert!(
            (mass_action - 1.0).abs() < 1e-9,
            "n_0 p_0 / n_i_0^2 = {} for {:?}",
            mass_action,
            doping
        );

        // Narrowing raises the effective density by a few percent at 1e15.
        let ratio = eq.n_i_0 / intrinsic.n_i;
        assert!(ratio > 1.0 && ratio < 1.1, "n_i_0 / n_i = {}", ratio);
    }
}

#[test]
fn test_mass_action_over_doping_range() {
    let n_i = 9.65e9;
    for exp in [10.0, 12.0, 14.0, 16.0, 18.0, 20.0] {
        let level = 10f64.powf(exp);
        for doping in [Doping::donors(level), Doping::acceptors(level)] {
            let (n, p) = carrier_densities(&doping, 0.0, 0.0, n_i);
            let rel = (n * p / (n_i * n_i) - 1.0).abs();
            assert!(rel < 1e-10, "{:?}: rel error {:e}", doping, rel);
        }
    }
}

#[test]
fn test_fermi_inverse_symmetry_near_branches() {
    // Around eta = 3 (forward split) and the inverse splits at f = 4.475, 1e-2.
    for eta in [2.9, 2.999, 3.001, 3.1] {
        let back = inverse_fermi_half(fermi_half(eta)).unwrap();
        assert!((back - eta).abs() < 5e-3, "eta {} -> {}", eta, back);
    }
    for eta in [-4.5, -4.6, -4.7] {
        let back = inverse_fermi_half(fermi_half(eta)).unwrap();
        assert!((back - eta).abs() < 1e-2, "eta {} -> {}", eta, back);
    }
}

#[test]
fn test_doping_sign_convention() {
    for resistivity in [0.1, 1.0, 5.0, 50.0, 1000.0] {
        let n = doping_from_resistivity(DopingType::NType, resistivity).unwrap();
        assert!(n.n_d > 0.0);
        assert_eq!(n.n_a, 0.0);

        let p = doping_from_resistivity(DopingType::PType, resistivity).unwrap();
        assert_eq!(p.n_d, 0.0);
        assert!(p.n_a > 0.0);
    }
}

#[test]
fn test_harmonic_combination_over_profile() {
    let wafer = WaferState::new(T, 0.03, Doping::donors(1e15), FixedPointCriteria::default())
        .unwrap();
    let dn = logspace(13.0, 17.0, 40);
    let profile = wafer.injection_profile(&dn).unwrap();
    let n_m = wafer.majority_doping();

    for i in 0..dn.len() {
        let sdr = tau_surface(dn[i], 1e-14, n_m, profile.n_i_eff[i], wafer.thickness);
        let srh = tau_srh(dn[i], n_m, 1e-4, 1e-4);
        let components = [profile.tau_rad[i], profile.tau_aug[i], sdr, srh];
        let eff = effective_lifetime(components);
        let min = components.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(eff <= min, "tau_eff {:e} > min {:e} at dn = {:e}", eff, min, dn[i]);
        assert!(eff > 0.0);
    }
}

#[test]
fn test_srh_monotonic_for_long_majority_lifetime() {
    let n_m = 5e15;
    let dn = logspace(10.0, 19.0, 200);
    let taus: Vec<f64> = dn.iter().map(|&d| tau_srh(d, n_m, 2e-5, 8e-4)).collect();
    assert!(taus.windows(2).all(|w| w[1] > w[0]));
}
