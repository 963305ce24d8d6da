//! Crystalline silicon carrier physics for lifetime analysis.
//!
//! This crate provides:
//! - Fermi-Dirac integral approximations and the degeneracy factor
//! - Temperature-dependent intrinsic properties
//! - Doping density from resistivity
//! - Carrier densities and Schenk bandgap narrowing
//! - Equilibrium and steady-state solvers for the effective intrinsic density
//! - Radiative, Auger, surface and SRH recombination lifetimes
//!
//! Energies are in eV relative to the intrinsic Fermi level, densities in
//! cm^-3, lengths in cm and lifetimes in s.

pub mod bandgap;
pub mod carrier;
pub mod doping;
pub mod equilibrium;
pub mod error;
pub mod fermi;
pub mod fixed_point;
pub mod intrinsic;
pub mod recombination;
pub mod steady_state;
pub mod wafer;

pub use bandgap::{BandgapShift, bandgap_narrowing};
pub use carrier::carrier_densities;
pub use doping::doping_from_resistivity;
pub use equilibrium::{EquilibriumState, solve_equilibrium};
pub use error::{Error, Result};
pub use fixed_point::{FixedPointCriteria, FixedPointReport};
pub use intrinsic::IntrinsicParams;
pub use recombination::{effective_lifetime, tau_auger, tau_radiative, tau_srh, tau_surface};
pub use steady_state::{SteadyState, solve_steady_state};
pub use wafer::{InjectionProfile, WaferState};
