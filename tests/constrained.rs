//! End-to-end scenarios for the constrained pair-move sampler, all run
//! with seeded random sources so every expectation is deterministic.

use itertools::izip;
use nalgebra::Vector3;
use spin_cmc::{
    init_cmc, CmcConfig, CmcDriver, Material, SpinField, StepOutcome, ZeemanEnergy, ZeroField,
};

const UP: Vector3<f64> = Vector3::new(0.0, 0.0, 1.0);

fn zero_driver(n: usize, config: CmcConfig) -> CmcDriver<ZeroField> {
    let field = SpinField::uniform(n, UP, 0).unwrap();
    init_cmc(config, field, ZeroField, vec![Material::new(1.5e-23)]).unwrap()
}

fn assert_invariants(driver: &CmcDriver<impl spin_cmc::EnergyOracle>) {
    let n = driver.field().len();
    for i in 0..n {
        let norm = driver.field().get(i).norm();
        assert!((norm - 1.0).abs() <= 1e-10, "site {} norm {}", i, norm);
    }
    let drift = (driver.magnetization() - driver.field().total_spin()).norm();
    assert!(drift <= 1e-8 * n as f64, "magnetization drift {}", drift);
    let counters = driver.counters();
    assert_eq!(
        counters.total_trials,
        counters.successes + counters.energy_rejects + counters.sphere_rejects
    );
}

#[test]
fn pure_constraint_random_walk_stays_on_axis() {
    let config = CmcConfig {
        seed: 1,
        ..CmcConfig::default()
    };
    let mut driver = zero_driver(1000, config);
    for _ in 0..100 {
        driver.sweep().unwrap();
        let m = driver.magnetization();
        // The constraint is along +z, so the transverse lab components are
        // conserved at their initial zero.
        assert!(m.x.abs() <= 1e-6);
        assert!(m.y.abs() <= 1e-6);
        assert!(driver.constrained_moment() >= 0.0);
        assert!(driver.constrained_moment() <= 1000.0 + 1e-6);
    }
    assert_invariants(&driver);
}

#[test]
fn tilted_constraint_conserves_the_transverse_components() {
    let config = CmcConfig {
        phi_deg: 45.0,
        theta_deg: 30.0,
        seed: 2,
        ..CmcConfig::default()
    };
    let mut driver = zero_driver(1000, config);
    let axis = driver.frame().constraint_axis();
    for _ in 0..100 {
        driver.sweep().unwrap();
        let m = driver.magnetization();
        // Orthogonal components stay at zero; M remains parallel to c.
        let transverse = m - axis * m.dot(&axis);
        assert!(transverse.norm() <= 1e-6, "transverse {}", transverse.norm());
        let m_cf = driver.frame().to_frame(m);
        assert!(m_cf.x.abs() <= 1e-6);
        assert!(m_cf.y.abs() <= 1e-6);
        assert!(driver.constrained_moment() >= 0.0);
    }
    assert_invariants(&driver);
}

#[test]
fn seeded_runs_reproduce_bit_exactly() {
    let config = CmcConfig {
        seed: 42,
        ..CmcConfig::default()
    };
    let mut first = zero_driver(100, config.clone());
    let mut second = zero_driver(100, config);
    first.run(10).unwrap();
    second.run(10).unwrap();
    assert_eq!(first.counters(), second.counters());
    assert_eq!(first.field(), second.field());
    assert_eq!(first.magnetization(), second.magnetization());
}

#[test]
fn two_spin_sphere_reject_fraction_is_moderate() {
    // Effectively infinite temperature; only geometry and the constraint
    // weight decide.
    let config = CmcConfig {
        temperature: 1e12,
        seed: 3,
        ..CmcConfig::default()
    };
    let mut driver = zero_driver(2, config);
    let delta = driver.run(1_000_000).unwrap();
    assert_eq!(delta.total_trials, 2_000_000);
    let fraction = delta.sphere_rejects as f64 / delta.total_trials as f64;
    assert!(
        (0.3..=0.7).contains(&fraction),
        "sphere reject fraction {}",
        fraction
    );
    // Acceptance stays bounded away from one by the sphere rejects.
    let stats = driver.stats();
    assert!(stats.acceptance_ratio < 1.0);
    assert!(stats.sphere_rejects > 0);
    assert_invariants(&driver);
}

#[test]
fn one_trial_touches_at_most_two_sites() {
    let config = CmcConfig {
        seed: 8,
        ..CmcConfig::default()
    };
    let mut driver = zero_driver(50, config);
    let mut seen_accept = false;
    let mut seen_energy_reject = false;
    let mut seen_sphere_reject = false;
    for _ in 0..20_000 {
        let before = driver.field().clone();
        let outcome = driver.step().unwrap();
        let changed = izip!(before.spins(), driver.field().spins())
            .filter(|(a, b)| a != b)
            .count();
        match outcome {
            StepOutcome::Accepted => {
                assert_eq!(changed, 2);
                seen_accept = true;
            }
            StepOutcome::EnergyRejected => {
                assert_eq!(changed, 0);
                seen_energy_reject = true;
            }
            StepOutcome::SphereRejected => {
                assert_eq!(changed, 0);
                seen_sphere_reject = true;
            }
        }
        if seen_accept && seen_energy_reject && seen_sphere_reject {
            break;
        }
    }
    assert!(seen_accept && seen_energy_reject && seen_sphere_reject);
}

#[test]
fn accepted_moves_conserve_the_in_plane_components() {
    let config = CmcConfig {
        phi_deg: 45.0,
        theta_deg: 30.0,
        seed: 9,
        ..CmcConfig::default()
    };
    let mut driver = zero_driver(50, config);
    let mut accepted = 0;
    for _ in 0..2000 {
        let before = driver.magnetization();
        if driver.step().unwrap() == StepOutcome::Accepted {
            let delta_cf = driver.frame().to_frame(driver.magnetization() - before);
            assert!(delta_cf.x.abs() <= 1e-10, "in-plane x {}", delta_cf.x);
            assert!(delta_cf.y.abs() <= 1e-10, "in-plane y {}", delta_cf.y);
            accepted += 1;
        }
    }
    assert!(accepted > 0);
}

#[test]
fn incremental_magnetization_tracks_the_spin_sum() {
    let config = CmcConfig {
        seed: 5,
        ..CmcConfig::default()
    };
    let mut driver = zero_driver(100, config);
    driver.run(10).unwrap();
    assert_eq!(driver.counters().total_trials, 1000);
    let drift = (driver.magnetization() - driver.field().total_spin()).norm();
    assert!(drift <= 1e-6, "drift {}", drift);
}

#[test]
fn strong_applied_field_keeps_the_constrained_moment_high() {
    let field = SpinField::uniform(200, UP, 0).unwrap();
    let oracle = ZeemanEnergy::new(Vector3::new(0.0, 0.0, 1e5));
    let config = CmcConfig {
        seed: 11,
        ..CmcConfig::default()
    };
    let mut driver = init_cmc(config, field, oracle, vec![Material::new(spin_cmc::MU_B)]).unwrap();
    for _ in 0..50 {
        driver.sweep().unwrap();
        assert!(driver.constrained_moment() / 200.0 >= 0.97);
    }
    assert_invariants(&driver);
}
