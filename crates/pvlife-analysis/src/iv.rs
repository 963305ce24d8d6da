//! Solar cell current-voltage analysis.
//!
//! Curves are stored the way the tester writes them: voltage swept from
//! forward to reverse bias with the cell current negative. Every analysis
//! reverses and negates them first so that voltage ascends and the
//! photocurrent is positive.

use log::info;
use pvlife_core::InputError;
use pvlife_solver::{linear_regression, mean};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Current steps of the series resistance method, as fractions of Isc.
const SERIES_STEP: f64 = 0.05;
const SERIES_POINTS: usize = 6;

/// Reverse-bias window for the shunt resistance fit (V).
const SHUNT_WINDOW: (f64, f64) = (-3.0, 0.0);

/// One current-voltage sweep in instrument orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvCurve {
    pub voltage: Vec<f64>,
    pub current: Vec<f64>,
}

impl IvCurve {
    pub fn validate(&self) -> Result<()> {
        if self.voltage.is_empty() {
            return Err(InputError::Empty("voltage").into());
        }
        if self.current.len() != self.voltage.len() {
            return Err(InputError::LengthMismatch {
                field: "current",
                expected: self.voltage.len(),
                actual: self.current.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Ascending voltage and positive photocurrent.
    pub fn oriented(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        self.validate()?;
        let voltage = self.voltage.iter().rev().copied().collect();
        let current = self.current.iter().rev().map(|i| -i).collect();
        Ok((voltage, current))
    }
}

/// Light, half-light and dark sweeps of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvMeasurement {
    /// Cell area (cm^2).
    pub area: f64,
    /// One-sun sweep.
    pub full: IvCurve,
    /// Half-sun sweep.
    pub half: IvCurve,
    pub dark: IvCurve,
}

/// One-sun performance figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub area: f64,
    pub isc: f64,
    pub voc: f64,
    pub pmpp: f64,
    pub impp: f64,
    pub vmpp: f64,
    pub ff: f64,
    pub eta: f64,
}

/// Everything [`process_iv`] derives from a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvResult {
    #[serde(flatten)]
    pub performance: Performance,
    /// Series resistance.
    pub rs: f64,
    /// Shunt resistance.
    pub rp: f64,
    pub jsc: f64,
    pub jmpp: f64,
    /// Area-normalised series resistance.
    pub rs_sqr: f64,
    /// Area-normalised shunt resistance.
    pub rp_sqr: f64,
    pub loss_rs: f64,
    pub loss_rp: f64,
    pub loss_mpp: f64,
}

/// Last index where `pred` holds.
fn last_where(values: &[f64], pred: impl Fn(f64) -> bool) -> Option<usize> {
    values.iter().rposition(|&v| pred(v))
}

/// Mean of the sample at `j` and its successor, when there is one.
fn pair_mean(values: &[f64], j: usize) -> f64 {
    mean(&values[j..(j + 2).min(values.len())])
}

/// `y` on the line through `p1` and `p2` at `x`.
fn line_at(p1: (f64, f64), p2: (f64, f64), x: f64) -> f64 {
    let m = (p2.1 - p1.1) / (p2.0 - p1.0);
    m * x + (p2.1 - m * p2.0)
}

/// `x` on the line through `p1` and `p2` where it reaches `y`.
fn line_inverse(p1: (f64, f64), p2: (f64, f64), y: f64) -> f64 {
    let m = (p2.1 - p1.1) / (p2.0 - p1.0);
    (y - (p2.1 - m * p2.0)) / m
}

/// Segment `[j, j + 1]` as two `(V, I)` points.
fn segment(v: &[f64], i: &[f64], j: usize, what: &'static str) -> Result<((f64, f64), (f64, f64))> {
    if j + 1 >= v.len() {
        return Err(InputError::NoCrossing(what).into());
    }
    Ok(((v[j], i[j]), (v[j + 1], i[j + 1])))
}

/// Isc, Voc, maximum power point, fill factor and efficiency of a one-sun
/// sweep.
pub fn calc_performance(curve: &IvCurve, area: f64) -> Result<Performance> {
    if !area.is_finite() || area <= 0.0 {
        return Err(InputError::InvalidValue {
            field: "area",
            value: area,
        }
        .into());
    }
    let (v, i) = curve.oriented()?;

    let j = last_where(&v, |x| x < 0.0).ok_or(InputError::NoCrossing("voltage"))?;
    let isc = pair_mean(&i, j);
    let j = last_where(&i, |x| x > 0.0).ok_or(InputError::NoCrossing("current"))?;
    let voc = pair_mean(&v, j);

    let power: Vec<f64> = i.iter().zip(&v).map(|(a, b)| a * b).collect();
    let (k, pmpp) = power
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (k, p)| if p > best.1 { (k, p) } else { best });

    let ff = pmpp / (isc * voc);
    Ok(Performance {
        area,
        isc,
        voc,
        pmpp,
        impp: i[k],
        vmpp: v[k],
        ff,
        eta: isc * voc * ff / (100.0 * area),
    })
}

/// Shunt resistance from the reverse-bias slope of a dark sweep.
pub fn calc_shunt_resistance(dark: &IvCurve) -> Result<f64> {
    let (v, i) = dark.oriented()?;
    let (x, y): (Vec<f64>, Vec<f64>) = v
        .iter()
        .zip(&i)
        .filter(|&(&v, _)| v >= SHUNT_WINDOW.0 && v <= SHUNT_WINDOW.1)
        .map(|(&v, &i)| (v, i))
        .unzip();
    if x.len() < 2 {
        return Err(InputError::TooFewSamples {
            context: "reverse-bias window of the dark sweep",
            required: 2,
            actual: x.len(),
        }
        .into());
    }
    let line = linear_regression(&x, &y)?;
    Ok(-1.0 / line.slope)
}

/// Series resistance from one-sun and half-sun sweeps.
///
/// Both curves are stepped down from their short-circuit current in six
/// equal steps of 5 % of the one-sun Isc; at each step the voltage shift
/// between the curves divided by their current difference gives one
/// estimate. The result is the mean estimate.
pub fn calc_series_resistance(full: &IvCurve, half: &IvCurve) -> Result<f64> {
    let (v_f, i_f) = full.oriented()?;
    let (v_h, i_h) = half.oriented()?;

    let short_circuit = |v: &[f64], i: &[f64]| -> Result<f64> {
        let j = last_where(v, |x| x < 0.0).ok_or(InputError::NoCrossing("voltage"))?;
        let (p1, p2) = segment(v, i, j, "voltage")?;
        Ok(line_at(p1, p2, 0.0))
    };
    let voltage_at = |v: &[f64], i: &[f64], target: f64| -> Result<f64> {
        let j = last_where(i, |x| x > target).ok_or(InputError::NoCrossing("current"))?;
        let (p1, p2) = segment(v, i, j, "current")?;
        Ok(line_inverse(p1, p2, target))
    };

    let isc_f = short_circuit(&v_f, &i_f)?;
    let isc_h = short_circuit(&v_h, &i_h)?;
    let step = isc_f * SERIES_STEP;

    let estimates = (1..=SERIES_POINTS)
        .map(|k| {
            let target_f = isc_f - step * k as f64;
            let target_h = isc_h - step * k as f64;
            let dv = voltage_at(&v_h, &i_h, target_h)? - voltage_at(&v_f, &i_f, target_f)?;
            Ok(dv / (target_f - target_h))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(mean(&estimates))
}

/// Performance, parasitic resistances and the resistive loss breakdown.
pub fn process_iv(measurement: &IvMeasurement) -> Result<IvResult> {
    let performance = calc_performance(&measurement.full, measurement.area)?;
    let rs = calc_series_resistance(&measurement.full, &measurement.half)?;
    let rp = calc_shunt_resistance(&measurement.dark)?;

    let area = performance.area;
    let jsc = performance.isc / area;
    let jmpp = performance.impp / area;
    let rs_sqr = rs * area * 1e3;
    let rp_sqr = rp * area * 1e3;
    let vp = performance.vmpp * 1e-3 + rs_sqr * 1e-3 * jmpp;

    info!(
        "iv: Voc = {:.4} V, FF = {:.4}, Rs = {:.4e}, Rp = {:.4e}",
        performance.voc, performance.ff, rs, rp
    );

    Ok(IvResult {
        performance,
        rs,
        rp,
        jsc,
        jmpp,
        rs_sqr,
        rp_sqr,
        loss_rs: rs_sqr * 1e-3 * jmpp * jmpp,
        loss_rp: vp * vp / (rp_sqr * 1e-3),
        loss_mpp: vp * (jsc - jmpp),
    })
}
