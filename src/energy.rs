//! Per-site energy evaluation against an atomistic Hamiltonian.
//!
//! An energy oracle is anything that can report the energy contribution of
//! one site against the current spin field. The sampler only ever consumes
//! energy *differences* of single provisional spin flips, so the contract
//! is that `site_energy(field, i)` fully captures the dependence of the
//! total Hamiltonian on spin i: the difference of two calls around a change
//! of spin i alone is the exact total energy change, with no double
//! counting left for the caller to repair.
//!
//! Oracles must be deterministic with respect to the field they are handed.
//! In particular, stochastic thermal fluctuation fields have no place in a
//! constrained Monte Carlo run and must stay disabled.
//!
//! Two reference components are provided, `ZeemanEnergy` and
//! `UniaxialAnisotropy`, along with the trivial `ZeroField` oracle used to
//! probe the bare constrained random walk.

use nalgebra::Vector3;

use crate::field::SpinField;

/// An energy component of the system, evaluated one site at a time.
pub trait EnergyOracle {
    /// Energy of `site` against the current field, in joules.
    ///
    /// Any functional dependence on the spin at `site` must be fully
    /// captured, so that the difference of two calls around a single-spin
    /// change equals the total energy change of that move.
    fn site_energy(&self, field: &SpinField, site: usize) -> f64;

    /// Total energy of the field. Components whose site energies share
    /// pair terms must override this to halve the double count.
    fn total_energy(&self, field: &SpinField) -> f64 {
        (0..field.len()).map(|i| self.site_energy(field, i)).sum()
    }
}

/// The zero Hamiltonian. Every move is energetically free, which isolates
/// the geometric part of the constrained sampler.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroField;

impl EnergyOracle for ZeroField {
    fn site_energy(&self, _field: &SpinField, _site: usize) -> f64 {
        0.0
    }
}

/// Energy of each spin in a uniform applied field, `-s . H`.
#[derive(Clone, Debug)]
pub struct ZeemanEnergy {
    applied: Vector3<f64>,
}

impl ZeemanEnergy {
    /// A uniform applied field in tesla.
    pub fn new(applied: Vector3<f64>) -> Self {
        ZeemanEnergy { applied }
    }
}

impl EnergyOracle for ZeemanEnergy {
    fn site_energy(&self, field: &SpinField, site: usize) -> f64 {
        -field.get(site).dot(&self.applied)
    }
}

/// Uniaxial anisotropy, `-k (s . e)^2` for an easy axis e.
#[derive(Clone, Debug)]
pub struct UniaxialAnisotropy {
    axis: Vector3<f64>,
    strength: f64,
}

impl UniaxialAnisotropy {
    /// Easy axis (normalized here) and anisotropy constant `k`.
    pub fn new(axis: Vector3<f64>, strength: f64) -> Self {
        UniaxialAnisotropy {
            axis: axis.normalize(),
            strength,
        }
    }
}

impl EnergyOracle for UniaxialAnisotropy {
    fn site_energy(&self, field: &SpinField, site: usize) -> f64 {
        let projection = field.get(site).dot(&self.axis);
        -self.strength * projection * projection
    }
}
