//! The constrained Monte Carlo pair-move sampler.
//!
//! One trial move updates a pair of sites (i, j): site i receives a fresh
//! Gaussian proposal, site j absorbs the recoil so that the two in-plane
//! components of the total magnetization, expressed in the constraint
//! frame, are conserved exactly. Acceptance uses a Metropolis rule
//! modified by the phase-space Jacobian of the compensating move and by
//! the magnetization weight required for detailed balance under the
//! constraint,
//!
//! ```text
//! P = exp(-dE beta) * (Mz_new / Mz_old)^2 * |z_j / z_j'|
//! ```
//!
//! where Mz is the projection of the running magnetization on the
//! constraint axis and z_j, z_j' are the constraint-frame z components of
//! site j before and after the move.
//!
//! Within one driver the trial chain is strictly sequential; each pair
//! move sees the state left by the previous one. Running the chain in
//! parallel would break detailed balance, so the only parallelism offered
//! is across independent replicas (see [`run_replicas`]).
//!
//! Reference:
//! 1.  Asselin, P. et al. Constrained Monte Carlo method and calculation
//!     of the temperature dependence of magnetic anisotropy.
//!     Phys. Rev. B 82, 054415 (2010).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use itertools::izip;
use log::{debug, trace};
use nalgebra::Vector3;
use rand::Rng;
use rand_pcg::Pcg64;
use rayon::prelude::*;

use crate::energy::EnergyOracle;
use crate::error::CmcError;
use crate::field::{Material, SpinField};
use crate::frame::ConstraintFrame;
use crate::rng::RandomSource;
use crate::{INV_MU_B, K_B, MU_B};

/// Outcome of a single pair-move trial.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Both sites committed, magnetization updated.
    Accepted,
    /// Geometrically valid move that failed the acceptance test, or hit a
    /// degenerate projection; both sites restored.
    EnergyRejected,
    /// The compensating spin would leave the unit sphere, or j == i; site
    /// i restored, site j untouched.
    SphereRejected,
}

/// Construction parameters for a constrained run.
#[derive(Clone, Debug)]
pub struct CmcConfig {
    /// Polar constraint angle in degrees, stored modulo 360.
    pub phi_deg: f64,
    /// Azimuthal constraint angle in degrees, stored modulo 360.
    pub theta_deg: f64,
    /// Temperature in kelvin, must be positive.
    pub temperature: f64,
    /// Seed for the default PCG-64 random source.
    pub seed: u64,
    /// Compatibility switch: accept every downhill pair-move without
    /// evaluating the modified Metropolis criterion, as some legacy
    /// integrators do. The geometric weight can be below one even for
    /// dE < 0, so this short-circuit slightly biases the sampling and is
    /// off by default.
    pub accept_negative_delta_e: bool,
}

impl Default for CmcConfig {
    fn default() -> Self {
        CmcConfig {
            phi_deg: 0.0,
            theta_deg: 0.0,
            temperature: 300.0,
            seed: 42,
            accept_negative_delta_e: false,
        }
    }
}

/// Success and reject tallies. `total_trials` always equals the sum of the
/// three outcome counts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub successes: u64,
    pub energy_rejects: u64,
    pub sphere_rejects: u64,
    pub total_trials: u64,
}

impl Counters {
    fn record(&mut self, outcome: StepOutcome) {
        self.total_trials += 1;
        match outcome {
            StepOutcome::Accepted => self.successes += 1,
            StepOutcome::EnergyRejected => self.energy_rejects += 1,
            StepOutcome::SphereRejected => self.sphere_rejects += 1,
        }
    }

    /// Counts accumulated since an earlier snapshot of the same counters.
    pub fn delta_since(&self, earlier: &Counters) -> Counters {
        Counters {
            successes: self.successes - earlier.successes,
            energy_rejects: self.energy_rejects - earlier.energy_rejects,
            sphere_rejects: self.sphere_rejects - earlier.sphere_rejects,
            total_trials: self.total_trials - earlier.total_trials,
        }
    }

    pub fn acceptance_ratio(&self) -> f64 {
        if self.total_trials == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_trials as f64
        }
    }
}

/// Counter snapshot plus the derived acceptance ratio.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stats {
    pub successes: u64,
    pub energy_rejects: u64,
    pub sphere_rejects: u64,
    pub total_trials: u64,
    pub acceptance_ratio: f64,
}

/// The constrained Monte Carlo driver: one replica, one spin field, one
/// random source. All state is owned by the instance, so any number of
/// drivers can coexist or run as parallel replicas.
pub struct CmcDriver<H, R = Pcg64> {
    field: SpinField,
    oracle: H,
    materials: Vec<Material>,
    frame: ConstraintFrame,
    rng: RandomSource<R>,
    temperature: f64,
    beta: f64,
    magnetization: Vector3<f64>,
    counters: Counters,
    accept_negative_delta_e: bool,
    cancel: Option<Arc<AtomicBool>>,
}

/// Build a driver with the default seeded PCG-64 source.
///
/// The field is realigned along the constraint direction, the running
/// magnetization becomes N times that direction, and all counters start at
/// zero. Configuration problems are fatal here; nothing is constructed.
pub fn init_cmc<H: EnergyOracle>(
    config: CmcConfig,
    field: SpinField,
    oracle: H,
    materials: Vec<Material>,
) -> Result<CmcDriver<H>, CmcError> {
    CmcDriver::new(config, field, oracle, materials)
}

impl<H: EnergyOracle> CmcDriver<H> {
    /// See [`init_cmc`].
    pub fn new(
        config: CmcConfig,
        field: SpinField,
        oracle: H,
        materials: Vec<Material>,
    ) -> Result<Self, CmcError> {
        let rng = RandomSource::seeded(config.seed);
        CmcDriver::with_rng(config, field, oracle, materials, rng)
    }
}

impl<H: EnergyOracle, R: Rng> CmcDriver<H, R> {
    /// Build a driver around a caller-supplied random source.
    pub fn with_rng(
        config: CmcConfig,
        mut field: SpinField,
        oracle: H,
        materials: Vec<Material>,
        rng: RandomSource<R>,
    ) -> Result<Self, CmcError> {
        validate(&config, &field, &materials)?;
        let frame = ConstraintFrame::new(config.phi_deg, config.theta_deg)?;
        let axis = frame.constraint_axis();
        field.align(axis);
        let magnetization = axis * field.len() as f64;
        debug!(
            "cmc driver: {} sites, T = {} K, constraint axis ({:.6}, {:.6}, {:.6})",
            field.len(),
            config.temperature,
            axis.x,
            axis.y,
            axis.z
        );
        Ok(CmcDriver {
            field,
            oracle,
            materials,
            frame,
            rng,
            temperature: config.temperature,
            beta: MU_B / (K_B * config.temperature),
            magnetization,
            counters: Counters::default(),
            accept_negative_delta_e: config.accept_negative_delta_e,
            cancel: None,
        })
    }

    /// Re-initialize in place: realign every spin along the constraint
    /// direction, rebuild the running magnetization, zero the counters.
    /// The random stream continues where it left off; build a fresh driver
    /// for a bit-identical rerun.
    pub fn reset(&mut self) {
        let axis = self.frame.constraint_axis();
        self.field.align(axis);
        self.magnetization = axis * self.field.len() as f64;
        self.counters = Counters::default();
        debug!("cmc driver reset: {} sites realigned", self.field.len());
    }

    /// One trial pair-move. The outcome is also recorded in the counters.
    pub fn step(&mut self) -> Result<StepOutcome, CmcError> {
        let outcome = self.trial()?;
        self.counters.record(outcome);
        Ok(outcome)
    }

    /// One sweep: exactly N trial pair-moves. Returns the counter deltas
    /// contributed by this sweep.
    pub fn sweep(&mut self) -> Result<Counters, CmcError> {
        let before = self.counters;
        for _ in 0..self.field.len() {
            self.step()?;
        }
        let delta = self.counters.delta_since(&before);
        trace!(
            "sweep: {} accepts, {} energy rejects, {} sphere rejects",
            delta.successes,
            delta.energy_rejects,
            delta.sphere_rejects
        );
        Ok(delta)
    }

    /// Run `sweeps` sweeps, checking the cancellation token between sweeps
    /// (never inside one). Returns the aggregate counter deltas. On
    /// cancellation the field is left in its last accepted state.
    pub fn run(&mut self, sweeps: usize) -> Result<Counters, CmcError> {
        let before = self.counters;
        for _ in 0..sweeps {
            if self.cancelled() {
                return Err(CmcError::Cancelled);
            }
            self.sweep()?;
        }
        Ok(self.counters.delta_since(&before))
    }

    /// Install a cooperative cancellation token, polled between sweeps.
    pub fn set_cancel_token(&mut self, token: Arc<AtomicBool>) {
        self.cancel = Some(token);
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |token| token.load(Ordering::Relaxed))
    }

    /// Running total magnetization in the lab frame (spin sum).
    pub fn magnetization(&self) -> Vector3<f64> {
        self.magnetization
    }

    /// Magnetization per site in the lab frame.
    pub fn magnetization_per_site(&self) -> Vector3<f64> {
        self.magnetization / self.field.len() as f64
    }

    /// Projection of the running magnetization on the constraint axis.
    pub fn constrained_moment(&self) -> f64 {
        self.magnetization.dot(&self.frame.constraint_axis())
    }

    /// Moment-weighted magnetization, sum of mu_s(m(i)) s_i, in joules per
    /// tesla.
    pub fn total_moment(&self) -> Vector3<f64> {
        izip!(self.field.spins(), self.field.material_indices())
            .fold(Vector3::zeros(), |acc, (s, &m)| {
                acc + s * self.materials[m].moment
            })
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn stats(&self) -> Stats {
        Stats {
            successes: self.counters.successes,
            energy_rejects: self.counters.energy_rejects,
            sphere_rejects: self.counters.sphere_rejects,
            total_trials: self.counters.total_trials,
            acceptance_ratio: self.counters.acceptance_ratio(),
        }
    }

    pub fn field(&self) -> &SpinField {
        &self.field
    }

    pub fn frame(&self) -> &ConstraintFrame {
        &self.frame
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    fn site_energy_checked(&self, site: usize) -> Result<f64, CmcError> {
        let energy = self.oracle.site_energy(&self.field, site);
        if energy.is_finite() {
            Ok(energy)
        } else {
            Err(CmcError::OracleContractViolation { site })
        }
    }

    /// The pair-move itself. Counter bookkeeping happens in `step`.
    fn trial(&mut self) -> Result<StepOutcome, CmcError> {
        let n = self.field.len();

        // Site i: Gaussian proposal around the current spin. The trial
        // distribution follows the pre-move spin, so the noise is added
        // before normalization.
        let i = self.rng.index(n);
        let si_old = self.field.get(i);
        let si_old_cf = self.frame.to_frame(si_old);
        let noise = Vector3::new(self.rng.gaussian(), self.rng.gaussian(), self.rng.gaussian());
        let si_new = (si_old + noise).normalize();
        let si_new_cf = self.frame.to_frame(si_new);

        // dE for move 1, scaled to mu_B tesla by mu_s / mu_B. The old
        // energy is read before the provisional write.
        let e_i_old = self.site_energy_checked(i)?;
        self.field.set(i, si_new);
        let e_i_new = match self.site_energy_checked(i) {
            Ok(e) => e,
            Err(err) => {
                self.field.set(i, si_old);
                return Err(err);
            }
        };
        let mu_i = self.materials[self.field.material(i)].moment;
        let de_1 = (e_i_new - e_i_old) * mu_i * INV_MU_B;

        // Site j compensates in the constraint frame: the in-plane
        // components of the pair sum are preserved exactly.
        let j = self.rng.index(n);
        let sj_old = self.field.get(j);
        let sj_old_cf = self.frame.to_frame(sj_old);
        let x = si_old_cf.x + sj_old_cf.x - si_new_cf.x;
        let y = si_old_cf.y + sj_old_cf.y - si_new_cf.y;
        let rho2 = x * x + y * y;
        // Strict disk check; the boundary would make the Jacobian blow up.
        // The negated comparison also routes a NaN proposal here.
        if j == i || !(rho2 < 1.0) {
            self.field.set(i, si_old);
            return Ok(StepOutcome::SphereRejected);
        }
        // Keep site j in its hemisphere; z = 0 counts as the upper one.
        let hemisphere = if sj_old_cf.z < 0.0 { -1.0 } else { 1.0 };
        let sj_new_cf = Vector3::new(x, y, hemisphere * (1.0 - rho2).sqrt());
        let sj_new = self.frame.to_lab(sj_new_cf);

        let e_j_old = match self.site_energy_checked(j) {
            Ok(e) => e,
            Err(err) => {
                self.field.set(i, si_old);
                return Err(err);
            }
        };
        self.field.set(j, sj_new);
        let e_j_new = match self.site_energy_checked(j) {
            Ok(e) => e,
            Err(err) => {
                self.field.set(j, sj_old);
                self.field.set(i, si_old);
                return Err(err);
            }
        };
        let mu_j = self.materials[self.field.material(j)].moment;
        let de_2 = (e_j_new - e_j_old) * mu_j * INV_MU_B;

        // Projection of the magnetization on the constraint axis, before
        // and after, from the full running lab-frame sum.
        let axis = self.frame.constraint_axis();
        let delta_m = si_new + sj_new - si_old - sj_old;
        let mz_old = self.magnetization.dot(&axis);
        let mz_new = (self.magnetization + delta_m).dot(&axis);

        let de = de_1 + de_2;
        let accepted = if mz_old == 0.0 {
            // Degenerate projection; cannot form the weight.
            false
        } else if self.accept_negative_delta_e && de < 0.0 {
            // Legacy short-circuit: no Metropolis draw for downhill moves.
            mz_new >= 0.0
        } else {
            let weight = (mz_new / mz_old) * (mz_new / mz_old);
            let jacobian = (sj_old_cf.z / sj_new_cf.z).abs();
            let p = (-de * self.beta).exp() * weight * jacobian;
            let u = self.rng.uniform();
            // A NaN p compares false and lands on the reject path.
            mz_new >= 0.0 && p >= u
        };

        if accepted {
            self.magnetization += delta_m;
            Ok(StepOutcome::Accepted)
        } else {
            self.field.set(j, sj_old);
            self.field.set(i, si_old);
            Ok(StepOutcome::EnergyRejected)
        }
    }
}

/// Run independent replicas concurrently, `sweeps` sweeps each. Replicas
/// share no state; within each one the trial chain stays sequential. The
/// first error encountered is propagated.
pub fn run_replicas<H, R>(
    drivers: &mut [CmcDriver<H, R>],
    sweeps: usize,
) -> Result<Vec<Counters>, CmcError>
where
    H: EnergyOracle + Send,
    R: Rng + Send,
{
    drivers
        .par_iter_mut()
        .map(|driver| driver.run(sweeps))
        .collect()
}

fn validate(config: &CmcConfig, field: &SpinField, materials: &[Material]) -> Result<(), CmcError> {
    if !config.temperature.is_finite() || config.temperature <= 0.0 {
        return Err(CmcError::InvalidConfig(format!(
            "temperature must be positive and finite, got {} K",
            config.temperature
        )));
    }
    if materials.is_empty() {
        return Err(CmcError::InvalidConfig("empty materials table".into()));
    }
    for (index, material) in materials.iter().enumerate() {
        if !material.moment.is_finite() || material.moment <= 0.0 {
            return Err(CmcError::InvalidConfig(format!(
                "material {} has non-positive moment {} J/T",
                index, material.moment
            )));
        }
    }
    for (site, &m) in field.material_indices().iter().enumerate() {
        if m >= materials.len() {
            return Err(CmcError::InvalidConfig(format!(
                "site {} references material {} but only {} materials are defined",
                site,
                m,
                materials.len()
            )));
        }
    }
    Ok(())
}
