//! Scalar device metrics at a reference excess density.

use pvlife_physics::WaferState;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lifetime::model::{ModelCurves, Param};

/// Fraction of the majority doping used when no reference density is given.
pub const DEFAULT_REFERENCE_FRACTION: f64 = 0.1;

/// A fitted (or prescribed) parameter in both scales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedParam {
    pub param: Param,
    pub value: f64,
    pub log10: f64,
}

/// Lifetimes and derived quantities at one sample of the resampled curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeMetrics {
    /// Requested reference density (cm^-3).
    pub nd_ref: f64,
    /// Density of the sample actually used (cm^-3).
    pub nd: f64,
    pub index: usize,
    pub t_eff: f64,
    /// Bulk (SRH) lifetime.
    pub t_blk: Option<f64>,
    pub t_sdr: Option<f64>,
    pub t_aug: Option<f64>,
    pub t_rad: Option<f64>,
    #[serde(rename = "J_0")]
    pub j_0: Option<f64>,
    /// SRH asymmetry `t_M0 / t_m0`.
    pub k_val: Option<f64>,
    /// Implied open-circuit voltage (V).
    pub implied_voc: f64,
}

/// Reference density: the requested one, or a tenth of the majority doping.
pub fn reference_density(requested: Option<f64>, n_m: f64) -> f64 {
    requested.unwrap_or(DEFAULT_REFERENCE_FRACTION * n_m)
}

/// First sample with `dn >= nd_ref`.
pub fn reference_index(dn: &[f64], nd_ref: f64) -> Option<usize> {
    dn.iter().position(|&d| d >= nd_ref)
}

impl LifetimeMetrics {
    /// Read every metric at `index` of `curves`.
    pub fn at(
        curves: &ModelCurves,
        index: usize,
        nd_ref: f64,
        parameters: &[FittedParam],
        wafer: &WaferState,
    ) -> Result<Self> {
        let pick = |curve: &Option<Vec<f64>>| curve.as_ref().map(|c| c[index]);
        let value = |param: Param| {
            parameters
                .iter()
                .find(|p| p.param == param)
                .map(|p| p.value)
        };

        let k_val = match (
            value(Param::MinorityLifetime),
            value(Param::MajorityLifetime),
        ) {
            (Some(t_m0), Some(t_big_m0)) => Some(t_big_m0 / t_m0),
            _ => None,
        };

        let nd = curves.dn[index];
        let implied_voc = wafer.implied_voc(nd, curves.n_i_eff[index])?;

        Ok(Self {
            nd_ref,
            nd,
            index,
            t_eff: curves.tau_eff[index],
            t_blk: pick(&curves.tau_srh),
            t_sdr: pick(&curves.tau_sdr),
            t_aug: pick(&curves.tau_aug),
            t_rad: pick(&curves.tau_rad),
            j_0: value(Param::J0),
            k_val,
            implied_voc,
        })
    }
}
