//! Recombination model definition and parameter layout.
//!
//! A [`LifetimeModel`] is an ordered set of [`Component`]s. Radiative and
//! Auger recombination are fixed by the wafer; surface and SRH components
//! carry fit parameters in log10 space. [`ParamLayout`] maps every parameter
//! to its slot in the optimisation vector once, and [`ModelEvaluator`] turns
//! a parameter vector into lifetimes over an injection profile.

use std::fmt;

use pvlife_physics::{InjectionProfile, effective_lifetime, tau_srh, tau_surface};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A fit parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Param {
    /// Surface recombination current prefactor (A/cm^2).
    #[serde(rename = "J_0")]
    J0,
    /// Prefactor of the secondary surface component (A/cm^2).
    #[serde(rename = "J_02")]
    J02,
    /// Low-injection SRH lifetime (s).
    #[serde(rename = "t_m0")]
    MinorityLifetime,
    /// SRH lifetime increment towards high injection (s).
    #[serde(rename = "t_M0")]
    MajorityLifetime,
}

impl Param {
    pub fn name(self) -> &'static str {
        match self {
            Self::J0 => "J_0",
            Self::J02 => "J_02",
            Self::MinorityLifetime => "t_m0",
            Self::MajorityLifetime => "t_M0",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Initial value and closed bounds of one parameter, all in log10.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub init: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ParamSpec {
    pub fn new(init: f64, lower: f64, upper: f64) -> Self {
        Self { init, lower, upper }
    }

    fn validate(&self, param: Param) -> Result<()> {
        let finite = self.init.is_finite() && self.lower.is_finite() && self.upper.is_finite();
        if !finite || self.lower >= self.upper {
            return Err(Error::Model(format!(
                "{} bounds [{}, {}] are not a valid interval",
                param, self.lower, self.upper
            )));
        }
        if self.init < self.lower || self.init > self.upper {
            return Err(Error::Model(format!(
                "{} initial value {} lies outside [{}, {}]",
                param, self.init, self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// One recombination channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Component {
    Radiative,
    Auger,
    /// Surface recombination with prefactor `J_0`.
    SurfaceDefect { j_0: ParamSpec },
    /// A second, independent surface channel with prefactor `J_02`.
    SurfaceDefectSecondary { j_02: ParamSpec },
    /// Two-parameter SRH interpolation.
    Srh { t_m0: ParamSpec, t_big_m0: ParamSpec },
}

impl Component {
    /// Parameters this component contributes, in layout order.
    pub fn params(&self) -> Vec<(Param, ParamSpec)> {
        match *self {
            Self::Radiative | Self::Auger => Vec::new(),
            Self::SurfaceDefect { j_0 } => vec![(Param::J0, j_0)],
            Self::SurfaceDefectSecondary { j_02 } => vec![(Param::J02, j_02)],
            Self::Srh { t_m0, t_big_m0 } => vec![
                (Param::MinorityLifetime, t_m0),
                (Param::MajorityLifetime, t_big_m0),
            ],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Radiative => "radiative",
            Self::Auger => "auger",
            Self::SurfaceDefect { .. } => "surface_defect",
            Self::SurfaceDefectSecondary { .. } => "surface_defect_secondary",
            Self::Srh { .. } => "srh",
        }
    }
}

/// Ordered set of active recombination components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeModel {
    pub components: Vec<Component>,
}

impl Default for LifetimeModel {
    fn default() -> Self {
        Self::standard()
    }
}

impl LifetimeModel {
    /// Radiative, Auger, surface and SRH recombination.
    pub fn standard() -> Self {
        Self {
            components: vec![
                Component::Auger,
                Component::Radiative,
                Component::SurfaceDefect {
                    j_0: ParamSpec::new(-14.0, -16.0, -10.0),
                },
                Component::Srh {
                    t_m0: ParamSpec::new(-4.0, -7.0, -1.0),
                    t_big_m0: ParamSpec::new(-4.0, -7.0, -1.0),
                },
            ],
        }
    }

    /// Radiative, Auger and surface recombination only.
    pub fn surface_only() -> Self {
        Self {
            components: vec![
                Component::Auger,
                Component::Radiative,
                Component::SurfaceDefect {
                    j_0: ParamSpec::new(-14.0, -16.0, -11.0),
                },
            ],
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn has_surface(&self) -> bool {
        self.components.iter().any(|c| {
            matches!(
                c,
                Component::SurfaceDefect { .. } | Component::SurfaceDefectSecondary { .. }
            )
        })
    }

    /// Validate the component set and assign optimisation slots.
    pub fn layout(&self) -> Result<ParamLayout> {
        if self.components.is_empty() {
            return Err(Error::Model("no components".to_string()));
        }
        for (i, c) in self.components.iter().enumerate() {
            if self.components[..i].iter().any(|p| p.label() == c.label()) {
                return Err(Error::Model(format!("duplicate {} component", c.label())));
            }
        }

        let mut entries = Vec::new();
        for component in &self.components {
            for (param, spec) in component.params() {
                spec.validate(param)?;
                entries.push((param, spec));
            }
        }
        Ok(ParamLayout { entries })
    }
}

/// Position of every fit parameter in the optimisation vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayout {
    entries: Vec<(Param, ParamSpec)>,
}

impl ParamLayout {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_of(&self, param: Param) -> Option<usize> {
        self.entries.iter().position(|&(p, _)| p == param)
    }

    pub fn params(&self) -> Vec<Param> {
        self.entries.iter().map(|&(p, _)| p).collect()
    }

    pub fn initial(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, s)| s.init).collect()
    }

    pub fn lower(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, s)| s.lower).collect()
    }

    pub fn upper(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, s)| s.upper).collect()
    }
}

/// A component with its parameter slots resolved.
#[derive(Debug, Clone, Copy)]
enum Term {
    Radiative,
    Auger,
    Surface { slot: usize, secondary: bool },
    Srh { minority: usize, majority: usize },
}

/// Per-component lifetime curves over an excess density axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCurves {
    /// Excess carrier density (cm^-3).
    pub dn: Vec<f64>,
    pub n_i_eff: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_rad: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_aug: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_sdr: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_sdr2: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_srh: Option<Vec<f64>>,
    pub tau_eff: Vec<f64>,
    /// Effective lifetime with surface recombination removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau_blk: Option<Vec<f64>>,
}

/// Evaluates a model over a fixed injection profile.
///
/// Parameter vectors passed in are linear-scale values in layout order.
#[derive(Debug, Clone)]
pub struct ModelEvaluator<'a> {
    terms: Vec<Term>,
    profile: &'a InjectionProfile,
    n_m: f64,
    thickness: f64,
}

impl<'a> ModelEvaluator<'a> {
    pub fn new(
        model: &LifetimeModel,
        layout: &ParamLayout,
        profile: &'a InjectionProfile,
        n_m: f64,
        thickness: f64,
    ) -> Result<Self> {
        let slot = |param: Param| {
            layout
                .index_of(param)
                .ok_or_else(|| Error::Model(format!("{} has no slot in the layout", param)))
        };

        let terms = model
            .components
            .iter()
            .map(|c| {
                Ok(match c {
                    Component::Radiative => Term::Radiative,
                    Component::Auger => Term::Auger,
                    Component::SurfaceDefect { .. } => Term::Surface {
                        slot: slot(Param::J0)?,
                        secondary: false,
                    },
                    Component::SurfaceDefectSecondary { .. } => Term::Surface {
                        slot: slot(Param::J02)?,
                        secondary: true,
                    },
                    Component::Srh { .. } => Term::Srh {
                        minority: slot(Param::MinorityLifetime)?,
                        majority: slot(Param::MajorityLifetime)?,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            terms,
            profile,
            n_m,
            thickness,
        })
    }

    fn term_lifetime(&self, term: Term, values: &[f64], i: usize) -> f64 {
        let p = self.profile;
        match term {
            Term::Radiative => p.tau_rad[i],
            Term::Auger => p.tau_aug[i],
            Term::Surface { slot, .. } => {
                tau_surface(p.dn[i], values[slot], self.n_m, p.n_i_eff[i], self.thickness)
            }
            Term::Srh { minority, majority } => {
                tau_srh(p.dn[i], self.n_m, values[minority], values[majority])
            }
        }
    }

    /// Effective lifetime at every profile sample.
    pub fn tau_eff(&self, values: &[f64]) -> Vec<f64> {
        (0..self.profile.len())
            .map(|i| effective_lifetime(self.terms.iter().map(|&t| self.term_lifetime(t, values, i))))
            .collect()
    }

    /// Every component curve plus the effective and bulk lifetimes.
    pub fn curves(&self, values: &[f64]) -> ModelCurves {
        let n = self.profile.len();
        let curve = |term: Term| -> Vec<f64> {
            (0..n).map(|i| self.term_lifetime(term, values, i)).collect()
        };

        let mut out = ModelCurves {
            dn: self.profile.dn.clone(),
            n_i_eff: self.profile.n_i_eff.clone(),
            tau_eff: self.tau_eff(values),
            ..ModelCurves::default()
        };

        for &term in &self.terms {
            let lifetimes = curve(term);
            match term {
                Term::Radiative => out.tau_rad = Some(lifetimes),
                Term::Auger => out.tau_aug = Some(lifetimes),
                Term::Surface { secondary: false, .. } => out.tau_sdr = Some(lifetimes),
                Term::Surface { secondary: true, .. } => out.tau_sdr2 = Some(lifetimes),
                Term::Srh { .. } => out.tau_srh = Some(lifetimes),
            }
        }

        let surfaces: Vec<&Vec<f64>> = [&out.tau_sdr, &out.tau_sdr2]
            .into_iter()
            .flatten()
            .collect();
        if !surfaces.is_empty() {
            out.tau_blk = Some(
                (0..n)
                    .map(|i| {
                        let surface: f64 = surfaces.iter().map(|s| 1.0 / s[i]).sum();
                        1.0 / (1.0 / out.tau_eff[i] - surface)
                    })
                    .collect(),
            );
        }

        out
    }
}
