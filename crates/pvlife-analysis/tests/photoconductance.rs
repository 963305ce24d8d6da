//! Integration tests for lifetime derivation from photoconductance records.

use pvlife_analysis::{
    FitConfig, LifetimeModel, PhotoconductanceConfig, fit_lifetime, mobility_sum,
    process_photoconductance, trim_transient,
};
use pvlife_core::constants::Q;
use pvlife_core::{DopingType, IlluminationMode, MeasurementParams, PhotoconductanceRecord};

const W: f64 = 0.018;
const TAU: f64 = 1e-4;
const DT: f64 = 2e-6;

fn params(mode: IlluminationMode) -> MeasurementParams {
    MeasurementParams {
        temperature: 298.15,
        wafer_thickness: W,
        wafer_optical_const: 0.7,
        wafer_doping_type: DopingType::NType,
        wafer_resistivity: 1.0,
        illumination_mode: mode,
    }
}

/// Transient decay with a single lifetime, written as the conductance the
/// instrument would record.
fn exponential_decay() -> PhotoconductanceRecord {
    // 1 ohm cm n-type
    let n_m = 10f64.powf(15.69691);
    let time: Vec<f64> = (0..200).map(|i| (i + 1) as f64 * DT).collect();
    let conductance = time
        .iter()
        .map(|t| {
            let nd = 1e16 * (-t / TAU).exp();
            Q * W * nd * mobility_sum(nd + n_m)
        })
        .collect();
    PhotoconductanceRecord {
        illumination: vec![0.0; time.len()],
        time,
        conductance,
        params: params(IlluminationMode::Transient),
        dark_conductance: Some(0.018),
    }
}

#[test]
fn test_trimming_removes_flash_and_noise() {
    // Ten samples before the trigger, a linear flash rise, then an
    // exponential decay into a noise floor.
    let mut time = Vec::new();
    let mut conductance = Vec::new();
    for i in 0..400usize {
        let t = (i as f64 - 10.0) * DT;
        let c = if t <= 0.0 {
            0.0
        } else if i < 30 {
            0.05 * (i as f64 - 10.0) / 20.0
        } else {
            0.05 * (-((i - 30) as f64) * DT / TAU).exp()
        };
        time.push(t);
        conductance.push(c.max(1e-4));
    }
    let record = PhotoconductanceRecord {
        illumination: vec![0.0; time.len()],
        time,
        conductance,
        params: params(IlluminationMode::Transient),
        dark_conductance: None,
    };

    let trimmed = trim_transient(&record, &PhotoconductanceConfig::default()).unwrap();
    assert_eq!(trimmed.time.len(), 270);
    assert_eq!(trimmed.time[0], record.time[37]);
    assert_eq!(trimmed.time[269], record.time[306]);
    assert!(trimmed.conductance.iter().all(|&c| c > 2e-4));
    assert!(trimmed.conductance.windows(2).all(|w| w[1] < w[0]));
}

#[test]
fn test_transient_decay_end_to_end() {
    let record = exponential_decay();
    let result = process_photoconductance(&record, &PhotoconductanceConfig::default()).unwrap();

    // The curvature filter drops the first samples of the trace.
    assert_eq!(result.nd.len(), 194);
    for (i, tau) in result.tau.iter().enumerate() {
        assert!((tau / TAU - 1.0).abs() < 0.01, "tau[{}] = {:e}", i, tau);
    }
    assert!(result.implied_suns[0] > 1.0);
    assert!(*result.implied_suns.last().unwrap() < 1.0);
    assert!(
        (result.implied_voc - 0.6416).abs() < 2e-3,
        "1-sun iVoc {}",
        result.implied_voc
    );
    assert!((result.calc_wafer_resistivity.unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(result.unconverged_samples, 0);
}

#[test]
fn test_untrimmed_trace_keeps_every_sample() {
    let record = exponential_decay();
    let config = PhotoconductanceConfig::default().with_trim(false);
    let result = process_photoconductance(&record, &config).unwrap();
    assert_eq!(result.nd.len(), 200);
    assert_eq!(result.time, record.time);
}

#[test]
fn test_derived_curve_feeds_fit() {
    let record = exponential_decay();
    let result = process_photoconductance(&record, &PhotoconductanceConfig::default()).unwrap();
    let curve = result.to_lifetime_curve();
    assert_eq!(curve.nd.len(), result.nd.len());

    let config = FitConfig::default().with_model(LifetimeModel::surface_only());
    let fit = fit_lifetime(&curve, &config).unwrap();
    assert!(fit.param(pvlife_analysis::Param::J0).is_some());
}

#[test]
fn test_record_too_short_for_filter() {
    let mut record = exponential_decay();
    record.time.truncate(12);
    record.conductance.truncate(12);
    record.illumination.truncate(12);
    let config = PhotoconductanceConfig::default().with_trim(false);
    assert!(matches!(
        process_photoconductance(&record, &config),
        Err(pvlife_analysis::Error::Input(_))
    ));
}

#[test]
fn test_record_from_json() {
    let json = r#"{
        "time": [1e-6, 2e-6],
        "conductance": [0.01, 0.009],
        "illumination": [0.0, 0.0],
        "temperature": 298.15,
        "wafer_thickness": 0.018,
        "wafer_optical_const": 0.7,
        "wafer_doping_type": "p-type",
        "wafer_resistivity": 2.0,
        "illumination_mode": "gen"
    }"#;
    let record: PhotoconductanceRecord = serde_json::from_str(json).unwrap();
    assert_eq!(record.params.wafer_doping_type, DopingType::PType);
    assert_eq!(record.params.illumination_mode, IlluminationMode::Generalized);
    assert!(record.dark_conductance.is_none());
}
