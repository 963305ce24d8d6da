//! Per-wafer state shared by every excess density sample.

use log::{debug, warn};
use pvlife_core::{Doping, DopingType, thermal_voltage};
use serde::{Deserialize, Serialize};

use crate::doping::doping_from_resistivity;
use crate::equilibrium::{EquilibriumState, solve_equilibrium};
use crate::error::{Result, require_positive};
use crate::fixed_point::FixedPointCriteria;
use crate::intrinsic::IntrinsicParams;
use crate::recombination::{tau_auger, tau_radiative};
use crate::steady_state::{SteadyState, solve_steady_state};

/// Temperature, geometry, doping and the dark-state solution of a wafer.
///
/// Built once per fit; every excess density sample reuses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaferState {
    /// Temperature (K).
    pub temperature: f64,
    /// Thickness (cm).
    pub thickness: f64,
    pub doping: Doping,
    pub intrinsic: IntrinsicParams,
    pub equilibrium: EquilibriumState,
    pub criteria: FixedPointCriteria,
}

/// Charge-density dependent quantities over an excess density sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectionProfile {
    /// Excess carrier density (cm^-3).
    pub dn: Vec<f64>,
    /// Non-equilibrium effective intrinsic density (cm^-3).
    pub n_i_eff: Vec<f64>,
    /// Radiative lifetime (s).
    pub tau_rad: Vec<f64>,
    /// Auger lifetime (s).
    pub tau_aug: Vec<f64>,
    /// Indices of samples whose fixed-point loop hit the iteration cap.
    pub unconverged: Vec<usize>,
}

impl InjectionProfile {
    pub fn len(&self) -> usize {
        self.dn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dn.is_empty()
    }
}

impl WaferState {
    /// Solve the intrinsic and equilibrium problems for a wafer.
    pub fn new(
        temperature: f64,
        thickness: f64,
        doping: Doping,
        criteria: FixedPointCriteria,
    ) -> Result<Self> {
        require_positive("wafer thickness", thickness)?;
        let intrinsic = IntrinsicParams::at(temperature)?;
        let equilibrium = solve_equilibrium(&doping, temperature, &intrinsic, &criteria)?;

        debug!(
            "wafer at {} K: n_i = {:.4e}, n_i_0 = {:.4e} ({} iterations)",
            temperature, intrinsic.n_i, equilibrium.n_i_0, equilibrium.report.iterations
        );

        Ok(Self {
            temperature,
            thickness,
            doping,
            intrinsic,
            equilibrium,
            criteria,
        })
    }

    /// Same as [`WaferState::new`], deriving the doping from resistivity.
    pub fn from_resistivity(
        temperature: f64,
        thickness: f64,
        doping_type: DopingType,
        resistivity: f64,
        criteria: FixedPointCriteria,
    ) -> Result<Self> {
        let doping = doping_from_resistivity(doping_type, resistivity)?;
        Self::new(temperature, thickness, doping, criteria)
    }

    /// Majority doping density N_M (cm^-3).
    #[inline]
    pub fn majority_doping(&self) -> f64 {
        self.doping.majority()
    }

    /// Non-equilibrium state at equal electron and hole excess density `dn`.
    pub fn steady_state(&self, dn: f64) -> Result<SteadyState> {
        solve_steady_state(
            &self.doping,
            self.temperature,
            &self.intrinsic,
            self.equilibrium.n_i_0,
            dn,
            dn,
            &self.criteria,
        )
    }

    /// Effective intrinsic density plus radiative and Auger lifetimes for
    /// every sample of `dn`.
    ///
    /// Samples are solved one at a time; each has its own fixed-point loop.
    pub fn injection_profile(&self, dn: &[f64]) -> Result<InjectionProfile> {
        let mut profile = InjectionProfile {
            dn: dn.to_vec(),
            n_i_eff: Vec::with_capacity(dn.len()),
            tau_rad: Vec::with_capacity(dn.len()),
            tau_aug: Vec::with_capacity(dn.len()),
            unconverged: Vec::new(),
        };

        let eq = &self.equilibrium;
        for (i, &dn_i) in dn.iter().enumerate() {
            let state = self.steady_state(dn_i)?;
            if !state.report.converged {
                profile.unconverged.push(i);
            }

            profile.tau_rad.push(tau_radiative(
                dn_i,
                state.n,
                state.p,
                state.n_i_eff,
                self.temperature,
            )?);
            profile.tau_aug.push(tau_auger(
                dn_i,
                state.n,
                state.p,
                eq.n_0,
                eq.p_0,
                state.n_i_eff,
                self.temperature,
            )?);
            profile.n_i_eff.push(state.n_i_eff);
        }

        if !profile.unconverged.is_empty() {
            warn!(
                "{} of {} injection samples hit the fixed-point cap",
                profile.unconverged.len(),
                dn.len()
            );
        }

        Ok(profile)
    }

    /// Implied open-circuit voltage (V) at excess density `dn`.
    ///
    /// `V_T ln(dn (N_M + dn) / n_i_eff^2)`.
    pub fn implied_voc(&self, dn: f64, n_i_eff: f64) -> Result<f64> {
        require_positive("dn", dn)?;
        require_positive("n_i_eff", n_i_eff)?;
        let ratio = dn * (self.majority_doping() + dn) / (n_i_eff * n_i_eff);
        Ok(thermal_voltage(self.temperature) * ratio.ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wafer() -> WaferState {
        WaferState::new(
            298.15,
            0.03,
            Doping::donors(1e15),
            FixedPointCriteria::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_profile_shapes() {
        let w = wafer();
        let dn = [1e13, 1e14, 1e15, 1e16, 1e17];
        let profile = w.injection_profile(&dn).unwrap();
        assert_eq!(profile.len(), 5);
        assert_eq!(profile.tau_rad.len(), 5);
        assert_eq!(profile.tau_aug.len(), 5);
        assert!(profile.unconverged.is_empty());
        // Auger dominates at high injection
        assert!(profile.tau_aug[4] < profile.tau_rad[4]);
        assert!(profile.tau_aug.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_implied_voc_reasonable() {
        let w = wafer();
        let state = w.steady_state(1e15).unwrap();
        let voc = w.implied_voc(1e15, state.n_i_eff).unwrap();
        assert!(voc > 0.6 && voc < 0.75, "iVoc = {} V", voc);
    }

    #[test]
    fn test_from_resistivity_p_type() {
        let w = WaferState::from_resistivity(
            298.15,
            0.018,
            DopingType::PType,
            2.0,
            FixedPointCriteria::default(),
        )
        .unwrap();
        assert_eq!(w.doping.n_d, 0.0);
        assert!(w.majority_doping() > 1e15 && w.majority_doping() < 1e16);
        assert!(w.equilibrium.p_0 > w.equilibrium.n_0);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(
            WaferState::new(
                298.15,
                0.0,
                Doping::donors(1e15),
                FixedPointCriteria::default()
            )
            .is_err()
        );
    }

    #[test]
    fn test_zero_density_sample_fails() {
        let w = wafer();
        assert!(w.injection_profile(&[1e14, 0.0]).is_err());
    }
}
