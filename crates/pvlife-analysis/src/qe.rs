//! Internal quantum efficiency and optical loss breakdown.
//!
//! External quantum efficiency and reflectance are cut to the solar band,
//! corrected for calibration and finger shading, and converted to IQE.
//! With a contact shading fraction the remaining loss is split into
//! shading, reflection and recombination; with a solar spectrum the
//! spectral photon density is resampled onto the measurement grid.

use log::{debug, info};
use pvlife_core::constants::{C_LIGHT, H_EV};
use pvlife_core::{InputError, QeMeasurement};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings for [`process_quantum_efficiency`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QeConfig {
    /// Multiplier applied to the EQE to fix the absolute calibration.
    pub eqe_scale: f64,
    /// Finger shading subtracted from the measured reflectance.
    pub refl_shading: f64,
    /// Area-averaged contact shading. Enables the loss breakdown.
    pub contact_shading: Option<f64>,
    /// Inclusive wavelength band kept for analysis (nm).
    pub wavelength_range: (f64, f64),
}

impl Default for QeConfig {
    fn default() -> Self {
        Self {
            eqe_scale: 1.0,
            refl_shading: 0.0,
            contact_shading: None,
            wavelength_range: (300.0, 1200.0),
        }
    }
}

impl QeConfig {
    pub fn with_eqe_scale(mut self, eqe_scale: f64) -> Self {
        self.eqe_scale = eqe_scale;
        self
    }

    pub fn with_refl_shading(mut self, refl_shading: f64) -> Self {
        self.refl_shading = refl_shading;
        self
    }

    pub fn with_contact_shading(mut self, contact_shading: f64) -> Self {
        self.contact_shading = Some(contact_shading);
        self
    }

    pub fn with_wavelength_range(mut self, min: f64, max: f64) -> Self {
        self.wavelength_range = (min, max);
        self
    }
}

/// Tabulated solar irradiance, e.g. AM1.5G.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarSpectrum {
    /// Wavelength (nm).
    pub wavelength: Vec<f64>,
    /// Spectral irradiance (W m^-2 nm^-1).
    pub irradiance: Vec<f64>,
}

/// A quantum efficiency job as read from a job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QeJob {
    #[serde(flatten)]
    pub measurement: QeMeasurement,
    #[serde(default)]
    pub config: QeConfig,
    #[serde(default)]
    pub spectrum: Option<SolarSpectrum>,
}

/// Loss fractions per wavelength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QeLoss {
    pub shading: Vec<f64>,
    pub recombination: Vec<f64>,
    /// Shading + reflection + recombination.
    pub total: Vec<f64>,
}

/// Solar spectrum resampled on the measurement grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralWeighting {
    /// Mean irradiance in each wavelength bin (W m^-2 nm^-1).
    pub sol_power: Vec<f64>,
    /// Photon density per bin.
    pub sol_density: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QeResult {
    /// Wavelength after band trimming (nm).
    pub wavelength: Vec<f64>,
    pub eqe: Vec<f64>,
    pub reflectance: Vec<f64>,
    pub iqe: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss: Option<QeLoss>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrum: Option<SpectralWeighting>,
}

/// Internal quantum efficiency `EQE (1 + R)`.
pub fn internal_qe(eqe: &[f64], reflectance: &[f64]) -> Vec<f64> {
    eqe.iter()
        .zip(reflectance)
        .map(|(&e, &r)| e * (1.0 + r))
        .collect()
}

/// Split the optical and electrical loss at constant contact shading.
///
/// Recombination is what the IQE leaves after reflection and shading:
/// `(1 - iqe)(1 - R - S)`.
pub fn loss_breakdown(iqe: &[f64], reflectance: &[f64], contact_shading: f64) -> QeLoss {
    let shading = vec![contact_shading; iqe.len()];
    let recombination: Vec<f64> = iqe
        .iter()
        .zip(reflectance)
        .map(|(&q, &r)| {
            let lost = 1.0 - q;
            lost - lost * r - lost * contact_shading
        })
        .collect();
    let total = recombination
        .iter()
        .zip(reflectance)
        .map(|(&rec, &r)| contact_shading + r + rec)
        .collect();
    QeLoss {
        shading,
        recombination,
        total,
    }
}

/// Resample `spectrum` onto the uniform grid `wavelength`.
///
/// The spectrum is first cut to the grid's span. Each output bin is the mean
/// irradiance over `[w - dw/2, w + dw/2)` with `dw` the first grid step, and
/// its photon density is `sol 0.1 w dw / (h c 1e9)`.
pub fn spectral_weighting(wavelength: &[f64], spectrum: &SolarSpectrum) -> Result<SpectralWeighting> {
    if wavelength.len() < 2 {
        return Err(InputError::TooFewSamples {
            context: "spectral weighting",
            required: 2,
            actual: wavelength.len(),
        }
        .into());
    }
    if spectrum.irradiance.len() != spectrum.wavelength.len() {
        return Err(InputError::LengthMismatch {
            field: "irradiance",
            expected: spectrum.wavelength.len(),
            actual: spectrum.irradiance.len(),
        }
        .into());
    }

    let lo = wavelength[0];
    let hi = wavelength[wavelength.len() - 1];
    let dw = wavelength[1] - wavelength[0];
    let band: Vec<(f64, f64)> = spectrum
        .wavelength
        .iter()
        .zip(&spectrum.irradiance)
        .filter(|&(&w, _)| w >= lo && w <= hi)
        .map(|(&w, &e)| (w, e))
        .collect();

    let mut sol_power = Vec::with_capacity(wavelength.len());
    for &w in wavelength {
        let (sum, count) = band
            .iter()
            .filter(|&&(x, _)| x >= w - dw / 2.0 && x < w + dw / 2.0)
            .fold((0.0, 0usize), |(s, n), &(_, e)| (s + e, n + 1));
        if count == 0 {
            return Err(InputError::TooFewSamples {
                context: "solar spectrum bin",
                required: 1,
                actual: 0,
            }
            .into());
        }
        sol_power.push(sum / count as f64);
    }

    let photon = H_EV * C_LIGHT * 1e9;
    let sol_density = sol_power
        .iter()
        .zip(wavelength)
        .map(|(&p, &w)| p * 0.1 * w * dw / photon)
        .collect();

    Ok(SpectralWeighting {
        sol_power,
        sol_density,
    })
}

/// Trim, correct and analyse one EQE plus reflectance measurement.
///
/// # Errors
/// - [`crate::Error::Input`] for a malformed measurement, an empty band or
///   a solar spectrum too sparse for the grid
pub fn process_quantum_efficiency(
    measurement: &QeMeasurement,
    config: &QeConfig,
    spectrum: Option<&SolarSpectrum>,
) -> Result<QeResult> {
    measurement.validate()?;

    let (lo, hi) = config.wavelength_range;
    let keep: Vec<usize> = (0..measurement.wavelength.len())
        .filter(|&i| measurement.wavelength[i] >= lo && measurement.wavelength[i] <= hi)
        .collect();
    if keep.is_empty() {
        return Err(InputError::TooFewSamples {
            context: "wavelengths in the solar band",
            required: 1,
            actual: 0,
        }
        .into());
    }
    debug!(
        "kept {} of {} wavelengths in [{}, {}] nm",
        keep.len(),
        measurement.wavelength.len(),
        lo,
        hi
    );

    let wavelength: Vec<f64> = keep.iter().map(|&i| measurement.wavelength[i]).collect();
    let eqe: Vec<f64> = keep
        .iter()
        .map(|&i| measurement.eqe[i] * config.eqe_scale)
        .collect();
    let reflectance: Vec<f64> = keep
        .iter()
        .map(|&i| measurement.reflectance[i] - config.refl_shading)
        .collect();
    let iqe = internal_qe(&eqe, &reflectance);

    let loss = config
        .contact_shading
        .map(|shading| loss_breakdown(&iqe, &reflectance, shading));
    let spectrum = spectrum
        .map(|s| spectral_weighting(&wavelength, s))
        .transpose()?;

    info!(
        "quantum efficiency: {} wavelengths, peak IQE = {:.4}",
        wavelength.len(),
        iqe.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    );

    Ok(QeResult {
        wavelength,
        eqe,
        reflectance,
        iqe,
        loss,
        spectrum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement() -> QeMeasurement {
        let wavelength: Vec<f64> = (0..=21).map(|i| 250.0 + 50.0 * i as f64).collect();
        QeMeasurement {
            eqe: vec![0.8; wavelength.len()],
            reflectance: vec![0.1; wavelength.len()],
            wavelength,
        }
    }

    #[test]
    fn test_trim_scale_and_iqe() {
        let config = QeConfig::default()
            .with_eqe_scale(1.1)
            .with_refl_shading(0.02);
        let result = process_quantum_efficiency(&measurement(), &config, None).unwrap();

        assert_eq!(result.wavelength.len(), 19);
        assert_eq!(result.wavelength[0], 300.0);
        assert_eq!(result.wavelength[18], 1200.0);
        for ((&e, &r), &q) in result.eqe.iter().zip(&result.reflectance).zip(&result.iqe) {
            assert!((e - 0.88).abs() < 1e-12);
            assert!((r - 0.08).abs() < 1e-12);
            assert!((q - 0.88 * 1.08).abs() < 1e-12);
        }
        assert!(result.loss.is_none());
        assert!(result.spectrum.is_none());
    }

    #[test]
    fn test_loss_breakdown() {
        let loss = loss_breakdown(&[0.9, 0.5], &[0.1, 0.2], 0.05);
        assert_eq!(loss.shading, vec![0.05, 0.05]);
        // (1 - 0.9)(1 - 0.1 - 0.05)
        assert!((loss.recombination[0] - 0.085).abs() < 1e-12);
        assert!((loss.recombination[1] - 0.375).abs() < 1e-12);
        assert!((loss.total[0] - (0.05 + 0.1 + 0.085)).abs() < 1e-12);
        assert!((loss.total[1] - (0.05 + 0.2 + 0.375)).abs() < 1e-12);
    }

    #[test]
    fn test_flat_spectrum_weighting() {
        let spectrum = SolarSpectrum {
            wavelength: (250..=1450).map(f64::from).collect(),
            irradiance: vec![1.0; 1201],
        };
        let config = QeConfig::default().with_contact_shading(0.03);
        let result = process_quantum_efficiency(&measurement(), &config, Some(&spectrum)).unwrap();

        assert!(result.loss.is_some());
        let weighting = result.spectrum.unwrap();
        assert_eq!(weighting.sol_power.len(), 19);
        for ((&p, &d), &w) in weighting
            .sol_power
            .iter()
            .zip(&weighting.sol_density)
            .zip(&result.wavelength)
        {
            assert!((p - 1.0).abs() < 1e-12);
            let want = 0.1 * w * 50.0 / (H_EV * C_LIGHT * 1e9);
            assert!((d / want - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sparse_spectrum_rejected() {
        let spectrum = SolarSpectrum {
            wavelength: vec![300.0, 400.0, 500.0],
            irradiance: vec![1.0, 1.0, 1.0],
        };
        let wavelength = [300.0, 350.0, 400.0, 450.0, 500.0];
        let err = spectral_weighting(&wavelength, &spectrum).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Input(InputError::TooFewSamples {
                context: "solar spectrum bin",
                ..
            })
        ));
    }

    #[test]
    fn test_out_of_band_measurement() {
        let qe = QeMeasurement {
            wavelength: vec![1300.0, 1400.0],
            eqe: vec![0.1, 0.1],
            reflectance: vec![0.3, 0.3],
        };
        assert!(process_quantum_efficiency(&qe, &QeConfig::default(), None).is_err());
    }
}
