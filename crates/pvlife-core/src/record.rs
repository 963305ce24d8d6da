//! Measurement and lifetime-curve records.
//!
//! These are the plain structured values exchanged with import layers and
//! batch drivers. Every record validates itself before the physics sees it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InputError, Result};

/// Wafer dopant polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DopingType {
    #[serde(rename = "n-type")]
    NType,
    #[serde(rename = "p-type")]
    PType,
}

impl FromStr for DopingType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n-type" | "n" => Ok(Self::NType),
            "p-type" | "p" => Ok(Self::PType),
            _ => Err(InputError::UnknownDopingType(s.to_string())),
        }
    }
}

impl fmt::Display for DopingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NType => write!(f, "n-type"),
            Self::PType => write!(f, "p-type"),
        }
    }
}

/// Photoconductance illumination mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IlluminationMode {
    /// Generalized (quasi-steady-state and transient combined).
    #[serde(rename = "gen")]
    Generalized,
    /// Pure transient decay after the flash.
    #[serde(rename = "trans")]
    Transient,
}

impl FromStr for IlluminationMode {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gen" | "generalized" => Ok(Self::Generalized),
            "trans" | "transient" => Ok(Self::Transient),
            _ => Err(InputError::UnknownIlluminationMode(s.to_string())),
        }
    }
}

/// Donor and acceptor concentrations (cm^-3).
///
/// In practice one of the two is zero, depending on wafer type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Doping {
    /// Donor concentration N_D.
    pub n_d: f64,
    /// Acceptor concentration N_A.
    pub n_a: f64,
}

impl Doping {
    pub fn new(n_d: f64, n_a: f64) -> Self {
        Self { n_d, n_a }
    }

    /// n-type wafer with the given donor density.
    pub fn donors(n_d: f64) -> Self {
        Self { n_d, n_a: 0.0 }
    }

    /// p-type wafer with the given acceptor density.
    pub fn acceptors(n_a: f64) -> Self {
        Self { n_d: 0.0, n_a }
    }

    /// Majority doping density N_M = max(N_D, N_A).
    #[inline]
    pub fn majority(&self) -> f64 {
        self.n_d.max(self.n_a)
    }

    /// Net doping N_D - N_A.
    #[inline]
    pub fn net(&self) -> f64 {
        self.n_d - self.n_a
    }

    /// Total ionized doping N_D + N_A.
    #[inline]
    pub fn total(&self) -> f64 {
        self.n_d + self.n_a
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("n_d", self.n_d), ("n_a", self.n_a)] {
            if !value.is_finite() || value < 0.0 {
                return Err(InputError::InvalidValue { field, value });
            }
        }
        if self.majority() <= 0.0 {
            return Err(InputError::InvalidValue {
                field: "doping",
                value: self.majority(),
            });
        }
        Ok(())
    }
}

/// Scalar wafer and measurement parameters attached to a photoconductance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementParams {
    /// Temperature (K).
    pub temperature: f64,
    /// Wafer thickness (cm).
    pub wafer_thickness: f64,
    /// Optical constant (fraction of incident photons absorbed).
    pub wafer_optical_const: f64,
    pub wafer_doping_type: DopingType,
    /// Resistivity (ohm cm).
    pub wafer_resistivity: f64,
    pub illumination_mode: IlluminationMode,
}

impl MeasurementParams {
    pub fn validate(&self) -> Result<()> {
        check_positive("temperature", self.temperature)?;
        check_positive("wafer_thickness", self.wafer_thickness)?;
        check_positive("wafer_optical_const", self.wafer_optical_const)?;
        check_positive("wafer_resistivity", self.wafer_resistivity)?;
        Ok(())
    }
}

/// Raw photoconductance measurement as produced by an instrument importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoconductanceRecord {
    /// Sample times (s).
    pub time: Vec<f64>,
    /// Measured photoconductance (S).
    pub conductance: Vec<f64>,
    /// Illumination photon flux in suns-equivalent generation units.
    pub illumination: Vec<f64>,
    #[serde(flatten)]
    pub params: MeasurementParams,
    /// Dark conductance (S), when the instrument reports one.
    #[serde(default)]
    pub dark_conductance: Option<f64>,
}

impl PhotoconductanceRecord {
    /// Check array lengths, finiteness and time ordering.
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.time.is_empty() {
            return Err(InputError::Empty("time"));
        }
        check_len("conductance", self.time.len(), self.conductance.len())?;
        check_len("illumination", self.time.len(), self.illumination.len())?;
        check_finite("time", &self.time)?;
        check_finite("conductance", &self.conductance)?;
        check_finite("illumination", &self.illumination)?;
        check_increasing("time", &self.time)?;
        Ok(())
    }
}

/// Raw Suns-Voc measurement: open-circuit photovoltage under a decaying flash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunsVocRecord {
    /// Sample times (s).
    pub time: Vec<f64>,
    /// Open-circuit photovoltage (V).
    pub voltage: Vec<f64>,
    /// Illumination photon flux in suns-equivalent generation units.
    pub illumination: Vec<f64>,
    #[serde(flatten)]
    pub params: MeasurementParams,
}

impl SunsVocRecord {
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.time.is_empty() {
            return Err(InputError::Empty("time"));
        }
        check_len("voltage", self.time.len(), self.voltage.len())?;
        check_len("illumination", self.time.len(), self.illumination.len())?;
        check_finite("time", &self.time)?;
        check_finite("voltage", &self.voltage)?;
        check_finite("illumination", &self.illumination)?;
        check_increasing("time", &self.time)?;
        Ok(())
    }
}

/// External quantum efficiency and reflectance on one wavelength axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QeMeasurement {
    /// Wavelength (nm).
    pub wavelength: Vec<f64>,
    /// External quantum efficiency (fraction).
    pub eqe: Vec<f64>,
    /// Reflectance (fraction).
    pub reflectance: Vec<f64>,
}

impl QeMeasurement {
    pub fn validate(&self) -> Result<()> {
        if self.wavelength.is_empty() {
            return Err(InputError::Empty("wavelength"));
        }
        check_len("eqe", self.wavelength.len(), self.eqe.len())?;
        check_len("reflectance", self.wavelength.len(), self.reflectance.len())?;
        check_finite("wavelength", &self.wavelength)?;
        check_finite("eqe", &self.eqe)?;
        check_finite("reflectance", &self.reflectance)?;
        check_increasing("wavelength", &self.wavelength)?;
        Ok(())
    }
}

/// Injection-dependent effective lifetime ready for model fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeCurve {
    /// Excess carrier density (cm^-3).
    pub nd: Vec<f64>,
    /// Measured effective lifetime (s).
    pub tau: Vec<f64>,
    /// Temperature (K).
    pub temperature: f64,
    /// Wafer thickness (cm).
    pub wafer_thickness: f64,
    pub doping: Doping,
}

impl LifetimeCurve {
    pub fn validate(&self) -> Result<()> {
        check_positive("temperature", self.temperature)?;
        check_positive("wafer_thickness", self.wafer_thickness)?;
        self.doping.validate()?;
        if self.nd.is_empty() {
            return Err(InputError::Empty("nd"));
        }
        check_len("tau", self.nd.len(), self.tau.len())?;
        check_finite("tau", &self.tau)?;
        for &value in &self.nd {
            if !value.is_finite() || value <= 0.0 {
                return Err(InputError::InvalidValue { field: "nd", value });
            }
        }
        Ok(())
    }

    /// Samples with `lo <= nd <= hi`, preserving order.
    pub fn trimmed(&self, lo: f64, hi: f64) -> (Vec<f64>, Vec<f64>) {
        self.nd
            .iter()
            .zip(&self.tau)
            .filter(|&(&nd, _)| nd >= lo && nd <= hi)
            .map(|(&nd, &tau)| (nd, tau))
            .unzip()
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidValue { field, value })
    }
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(InputError::LengthMismatch {
            field,
            expected,
            actual,
        })
    }
}

fn check_finite(field: &'static str, values: &[f64]) -> Result<()> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(&value) => Err(InputError::InvalidValue { field, value }),
        None => Ok(()),
    }
}

fn check_increasing(field: &'static str, values: &[f64]) -> Result<()> {
    match values.windows(2).position(|w| w[1] <= w[0]) {
        Some(i) => Err(InputError::NonMonotonic { field, index: i + 1 }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MeasurementParams {
        MeasurementParams {
            temperature: 298.15,
            wafer_thickness: 0.018,
            wafer_optical_const: 0.7,
            wafer_doping_type: DopingType::NType,
            wafer_resistivity: 3.0,
            illumination_mode: IlluminationMode::Generalized,
        }
    }

    #[test]
    fn test_doping_type_parse() {
        assert_eq!("n-type".parse::<DopingType>().unwrap(), DopingType::NType);
        assert_eq!(" P-Type ".parse::<DopingType>().unwrap(), DopingType::PType);
        assert!(matches!(
            "x-type".parse::<DopingType>(),
            Err(InputError::UnknownDopingType(_))
        ));
    }

    #[test]
    fn test_record_json_field_names() {
        let json = r#"{
            "time": [0.0, 1.0], "conductance": [1.0, 0.5], "illumination": [0.1, 0.0],
            "temperature": 298.15, "wafer_thickness": 0.018, "wafer_optical_const": 0.7,
            "wafer_doping_type": "p-type", "wafer_resistivity": 2.0, "illumination_mode": "trans"
        }"#;
        let record: PhotoconductanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.params.wafer_doping_type, DopingType::PType);
        assert_eq!(record.params.illumination_mode, IlluminationMode::Transient);
        assert!(record.dark_conductance.is_none());
        record.validate().unwrap();
    }

    #[test]
    fn test_record_length_mismatch() {
        let record = PhotoconductanceRecord {
            time: vec![0.0, 1.0, 2.0],
            conductance: vec![1.0, 0.5],
            illumination: vec![0.0; 3],
            params: params(),
            dark_conductance: None,
        };
        assert!(matches!(
            record.validate(),
            Err(InputError::LengthMismatch { field: "conductance", .. })
        ));
    }

    #[test]
    fn test_record_time_must_increase() {
        let record = PhotoconductanceRecord {
            time: vec![0.0, 1.0, 1.0],
            conductance: vec![1.0; 3],
            illumination: vec![0.0; 3],
            params: params(),
            dark_conductance: None,
        };
        assert_eq!(
            record.validate(),
            Err(InputError::NonMonotonic { field: "time", index: 2 })
        );
    }

    #[test]
    fn test_curve_trim_inclusive() {
        let curve = LifetimeCurve {
            nd: vec![1e13, 1e14, 1e15, 1e16],
            tau: vec![1.0, 2.0, 3.0, 4.0],
            temperature: 298.15,
            wafer_thickness: 0.03,
            doping: Doping::donors(1e15),
        };
        curve.validate().unwrap();
        let (nd, tau) = curve.trimmed(1e14, 1e15);
        assert_eq!(nd, vec![1e14, 1e15]);
        assert_eq!(tau, vec![2.0, 3.0]);
    }

    #[test]
    fn test_curve_rejects_non_positive_density() {
        let curve = LifetimeCurve {
            nd: vec![1e13, 0.0],
            tau: vec![1.0, 2.0],
            temperature: 298.15,
            wafer_thickness: 0.03,
            doping: Doping::acceptors(1e16),
        };
        assert!(matches!(
            curve.validate(),
            Err(InputError::InvalidValue { field: "nd", .. })
        ));
    }

    #[test]
    fn test_suns_voc_record_from_json() {
        let json = r#"{
            "time": [0.0, 1e-3], "voltage": [0.65, 0.6], "illumination": [1.0, 0.5],
            "temperature": 298.15, "wafer_thickness": 0.018, "wafer_optical_const": 0.7,
            "wafer_doping_type": "n-type", "wafer_resistivity": 1.0, "illumination_mode": "gen"
        }"#;
        let record: SunsVocRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.voltage, vec![0.65, 0.6]);
        record.validate().unwrap();
    }

    #[test]
    fn test_qe_measurement_validation() {
        let mut qe = QeMeasurement {
            wavelength: vec![400.0, 500.0],
            eqe: vec![0.8, 0.9],
            reflectance: vec![0.1],
        };
        assert!(matches!(
            qe.validate(),
            Err(InputError::LengthMismatch { field: "reflectance", .. })
        ));
        qe.reflectance.push(0.05);
        qe.validate().unwrap();
        qe.wavelength = vec![500.0, 400.0];
        assert!(matches!(
            qe.validate(),
            Err(InputError::NonMonotonic { field: "wavelength", .. })
        ));
    }

    #[test]
    fn test_doping_majority() {
        assert_eq!(Doping::acceptors(2e16).majority(), 2e16);
        assert_eq!(Doping::donors(1e15).net(), 1e15);
        assert_eq!(Doping::acceptors(1e15).net(), -1e15);
    }
}
