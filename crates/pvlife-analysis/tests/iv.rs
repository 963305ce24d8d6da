//! Integration tests for current-voltage processing on a one-diode cell.

use pvlife_analysis::{IvCurve, IvMeasurement, process_iv};

const V_T: f64 = 0.025693;
const I_0: f64 = 1e-12;
const R_S: f64 = 0.5;
const R_SH: f64 = 1000.0;

/// One-diode cell swept over junction voltage, stored in instrument
/// orientation (descending voltage, negated current).
fn sweep(photocurrent: f64, lo: f64, hi: f64) -> IvCurve {
    let n = 400;
    let (mut voltage, mut current) = (Vec::with_capacity(n), Vec::with_capacity(n));
    for k in 0..n {
        let vj = lo + (hi - lo) * k as f64 / (n - 1) as f64;
        let i = photocurrent - I_0 * ((vj / V_T).exp() - 1.0) - vj / R_SH;
        voltage.push(vj - i * R_S);
        current.push(i);
    }
    IvCurve {
        voltage: voltage.into_iter().rev().collect(),
        current: current.into_iter().rev().map(|i| -i).collect(),
    }
}

fn measurement() -> IvMeasurement {
    IvMeasurement {
        area: 1.0,
        full: sweep(0.04, -0.2, 0.75),
        half: sweep(0.02, -0.2, 0.75),
        dark: sweep(0.0, -3.5, 0.6),
    }
}

#[test]
fn test_one_diode_cell() {
    let result = process_iv(&measurement()).unwrap();
    let perf = result.performance;

    let isc = 0.04 * R_SH / (R_SH + R_S);
    assert!((perf.isc / isc - 1.0).abs() < 1e-3, "isc {}", perf.isc);
    assert!(perf.voc > 0.62 && perf.voc < 0.635, "voc {}", perf.voc);
    assert!(perf.vmpp > 0.5 && perf.vmpp < perf.voc);
    assert!((perf.pmpp - perf.impp * perf.vmpp).abs() < 1e-15);
    assert!(perf.ff > 0.75 && perf.ff < 0.85, "ff {}", perf.ff);
    assert!((perf.eta - perf.pmpp / 100.0).abs() < 1e-12);

    assert!((result.rs / R_S - 1.0).abs() < 0.02, "rs {}", result.rs);
    assert!((result.rp / (R_SH + R_S) - 1.0).abs() < 1e-3, "rp {}", result.rp);
}

#[test]
fn test_derived_densities_and_losses() {
    let mut m = measurement();
    m.area = 2.0;
    let result = process_iv(&m).unwrap();
    let perf = result.performance;

    assert_eq!(result.jsc, perf.isc / 2.0);
    assert_eq!(result.jmpp, perf.impp / 2.0);
    assert!((result.rs_sqr - result.rs * 2e3).abs() < 1e-9);
    assert!((result.rp_sqr - result.rp * 2e3).abs() < 1e-6);

    let vp = perf.vmpp * 1e-3 + result.rs_sqr * 1e-3 * result.jmpp;
    assert!((result.loss_rs - result.rs_sqr * 1e-3 * result.jmpp.powi(2)).abs() < 1e-15);
    assert!((result.loss_rp - vp * vp / (result.rp_sqr * 1e-3)).abs() < 1e-15);
    assert!((result.loss_mpp - vp * (result.jsc - result.jmpp)).abs() < 1e-15);
}

#[test]
fn test_dark_sweep_without_reverse_bias() {
    let mut m = measurement();
    m.dark = sweep(0.0, 0.1, 0.6);
    assert!(process_iv(&m).is_err());
}

#[test]
fn test_result_serialises_flat() {
    let result = process_iv(&measurement()).unwrap();
    let json = serde_json::to_value(result).unwrap();
    assert!(json.get("voc").is_some());
    assert!(json.get("rs").is_some());
    assert!(json.get("performance").is_none());
}
