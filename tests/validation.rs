// tests/validation.rs
//
// Physics sanity checks on complete systems.
// Run with: cargo test
// Or only these tests: cargo test --test validation

use llg_lattice::config::{InitialState, SimulationConfig};
use llg_lattice::constants::MU_B;
use llg_lattice::effective_field::{FieldMask, Hamiltonian};
use llg_lattice::energy::EnergyBreakdown;
use llg_lattice::error::{EngineError, Result};
use llg_lattice::geometry::Geometry;
use llg_lattice::initial_states;
use llg_lattice::method::{CheckpointSink, Snapshot};
use llg_lattice::neighbours::{DmiConvention, Topology};
use llg_lattice::optimizer::{OptimizerKind, OptimizerSib2};
use llg_lattice::params::HamiltonianParameters;
use llg_lattice::simulation::Simulation;
use llg_lattice::solver::{Solver, SolverStopReason};
use llg_lattice::vector_field::VectorField;

use approx::assert_abs_diff_eq;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

fn two_spin_config() -> SimulationConfig {
    let mut cfg = SimulationConfig::default();
    cfg.geometry.n_cells = [2, 1, 1];
    cfg.geometry.periodic = [false; 3];
    cfg.hamiltonian.exchange = vec![0.0];
    cfg
}

fn film_config(n: usize) -> SimulationConfig {
    let mut cfg = SimulationConfig::default();
    cfg.geometry.n_cells = [n, n, 1];
    cfg.geometry.periodic = [true, true, false];
    cfg
}

/// Records (iteration, idx_image, initial, final) of every snapshot.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<(usize, usize, bool, bool)>>>);

impl CheckpointSink for SharedSink {
    fn save(&mut self, snapshot: &Snapshot<'_>) -> Result<()> {
        let mut saved = self
            .0
            .lock()
            .map_err(|_| EngineError::Checkpoint("poisoned".into()))?;
        saved.push((snapshot.iteration, snapshot.idx_image, snapshot.initial, snapshot.final_));
        Ok(())
    }
}

#[test]
fn sib2_precession_rotates_by_the_cayley_angle() {
    // Free precession about B || z with alpha = 0. For a field perpendicular to
    // the spin the midpoint scheme rotates by exactly 2 atan(gamma |F| dt / 2)
    // per step.
    let b = 1.0;
    let dt = 0.01;
    let n_steps = 50;

    let mut cfg = two_spin_config();
    cfg.hamiltonian.external_field_magnitude = b;
    cfg.hamiltonian.external_field_normal = [0.0, 0.0, 1.0];
    cfg.llg.damping = 0.0;
    cfg.llg.dt = dt;
    cfg.llg.n_iterations = n_steps;
    cfg.llg.n_iterations_log = 0;
    cfg.optimizer = OptimizerKind::Sib2;
    cfg.initial_state = InitialState::Homogeneous {
        direction: [1.0, 0.0, 0.0],
    };

    let gamma = cfg.llg.gamma;
    let mut sim = Simulation::new(cfg).unwrap();
    let report = sim.run(None, &AtomicBool::new(false)).unwrap();
    assert_eq!(report.stop_reason, SolverStopReason::MaxIterations);
    assert_eq!(report.iterations, n_steps);

    let f = MU_B * b;
    let phi = n_steps as f64 * 2.0 * (gamma * f * dt / 2.0).atan();
    for s in sim.chain().image(0) {
        assert!(
            approx_eq(s[0], phi.cos(), 1e-10) && approx_eq(s[1], phi.sin(), 1e-10),
            "expected angle {} got {:?}",
            phi,
            s
        );
        assert!(s[2].abs() < 1e-12, "s_z should stay 0, got {}", s[2]);
    }
}

#[test]
fn sib2_thermal_runs_are_reproducible() {
    let run = |seed: u64| {
        let mut cfg = film_config(4);
        cfg.n_images = 2;
        cfg.optimizer = OptimizerKind::Sib2;
        cfg.llg.temperature = 5.0;
        cfg.llg.damping = 0.5;
        cfg.llg.seed = seed;
        cfg.llg.n_iterations = 25;
        cfg.llg.force_convergence = 1e-14;
        let mut sim = Simulation::new(cfg).unwrap();
        let report = sim.run(None, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.stop_reason, SolverStopReason::MaxIterations);
        sim.chain().images().to_vec()
    };

    let a = run(7);
    let b = run(7);
    assert_eq!(a, b, "same seed must give identical trajectories");

    // Images start identical but draw from different generators.
    assert_ne!(a[0], a[1]);
    assert_ne!(a, run(8));

    for image in &a {
        for s in image {
            let n = (s[0] * s[0] + s[1] * s[1] + s[2] * s[2]).sqrt();
            assert!(approx_eq(n, 1.0, 1e-12), "|s| drifted to {}", n);
        }
        // A few K over a short run stays close to the ferromagnet.
        let mz = image.iter().map(|s| s[2]).sum::<f64>() / image.len() as f64;
        assert!(mz > 0.5, "magnetisation collapsed: {}", mz);
    }
}

#[test]
fn temperature_gradient_alone_drives_thermal_motion() {
    let run = |inclination: f64| {
        let mut cfg = film_config(6);
        cfg.optimizer = OptimizerKind::Sib2;
        cfg.llg.temperature = 0.0;
        cfg.llg.temperature_gradient_direction = [1.0, 0.0, 0.0];
        cfg.llg.temperature_gradient_inclination = inclination;
        cfg.llg.n_iterations = 20;
        cfg.llg.force_convergence = 1e-14;
        let mut sim = Simulation::new(cfg).unwrap();
        sim.run(None, &AtomicBool::new(false)).unwrap();
        sim.chain()
            .image(0)
            .iter()
            .map(|s| 1.0 - s[2])
            .fold(0.0_f64, f64::max)
    };

    // The base temperature is zero but half of the film is hot.
    let tilt = run(50.0);
    assert!(tilt > 1e-6, "spins did not move: max 1 - s_z = {}", tilt);
    assert_eq!(run(0.0), 0.0);
}

/// Runs SIB2 by hand so the noise switch can be set.
fn run_sib2(cfg: SimulationConfig, stochastic: bool) -> Vec<VectorField> {
    let sim = Simulation::new(cfg).unwrap();
    let llg = sim.config().llg.clone();
    let mut optimizer = OptimizerSib2::new(sim.config().n_images, sim.geometry().nos(), llg.dt, llg.seed);
    optimizer.set_stochastic(stochastic);
    let mut solver = Solver::new(
        Box::new(sim.method().unwrap()),
        Box::new(optimizer),
        llg.n_iterations,
        0,
    );
    let mut chain = sim.chain().clone();
    let report = solver.run(&mut chain, &AtomicBool::new(false)).unwrap();
    assert_eq!(report.stop_reason, SolverStopReason::MaxIterations);
    chain.images().to_vec()
}

#[test]
fn sib2_without_noise_ignores_the_temperature() {
    let config = |temperature: f64, seed: u64| {
        let mut cfg = two_spin_config();
        cfg.hamiltonian.external_field_magnitude = 1.0;
        cfg.hamiltonian.external_field_normal = [0.0, 0.0, 1.0];
        cfg.llg.damping = 0.3;
        cfg.llg.dt = 0.01;
        cfg.llg.n_iterations = 40;
        cfg.llg.temperature = temperature;
        cfg.llg.seed = seed;
        cfg.initial_state = InitialState::Homogeneous {
            direction: [1.0, 0.0, 0.0],
        };
        cfg
    };

    let cold = run_sib2(config(0.0, 1), true);
    let quiet_a = run_sib2(config(50.0, 1), false);
    let quiet_b = run_sib2(config(50.0, 2), false);
    assert_eq!(quiet_a, cold, "a deterministic step must not see the temperature");
    assert_eq!(quiet_a, quiet_b, "a deterministic step must not depend on the seed");

    let noisy = run_sib2(config(50.0, 1), true);
    assert_ne!(noisy, quiet_a);
    for s in &noisy[0] {
        let n = (s[0] * s[0] + s[1] * s[1] + s[2] * s[2]).sqrt();
        assert!(approx_eq(n, 1.0, 1e-12), "|s| drifted to {}", n);
    }
}

#[test]
fn damped_dynamics_lowers_the_energy() {
    let mut cfg = film_config(6);
    cfg.hamiltonian.anisotropy_magnitude = 0.1;
    cfg.optimizer = OptimizerKind::Sib2;
    cfg.llg.damping = 0.8;
    cfg.llg.dt = 0.02;
    cfg.llg.n_iterations = 200;
    cfg.initial_state = InitialState::Random { seed: 3 };

    let mut sim = Simulation::new(cfg).unwrap();
    let before = sim.energy(0).unwrap().total();
    sim.run(None, &AtomicBool::new(false)).unwrap();
    let after = sim.energy(0).unwrap().total();
    assert!(after < before, "energy should drop: {} -> {}", before, after);
}

#[test]
fn velocity_projection_relaxes_onto_the_field() {
    let mut cfg = film_config(4);
    cfg.hamiltonian.external_field_magnitude = 2.0;
    cfg.hamiltonian.anisotropy_magnitude = 0.05;
    cfg.optimizer = OptimizerKind::Vp;
    cfg.llg.direct_minimization = true;
    cfg.llg.dt = 0.2;
    cfg.llg.force_convergence = 1e-7;
    cfg.llg.n_iterations = 50_000;
    cfg.initial_state = InitialState::Homogeneous {
        direction: [1.0, 0.2, 1.0],
    };

    let mut sim = Simulation::new(cfg).unwrap();
    let report = sim.run(None, &AtomicBool::new(false)).unwrap();
    assert_eq!(report.stop_reason, SolverStopReason::Converged);
    assert!(report.converged.iter().all(|&c| c));
    assert!(report.max_torque[0] < 1e-7);
    for s in sim.chain().image(0) {
        assert!(s[2] > 1.0 - 1e-8, "spin not along +z: {:?}", s);
    }
}

fn term(e: &EnergyBreakdown, mask: FieldMask) -> f64 {
    let mut total = 0.0;
    if mask.zeeman {
        total += e.zeeman;
    }
    if mask.anisotropy {
        total += e.anisotropy;
    }
    if mask.exchange {
        total += e.exchange;
    }
    if mask.dmi {
        total += e.dmi;
    }
    if mask.four_spin {
        total += e.four_spin;
    }
    if mask.dipole {
        total += e.dipole;
    }
    total
}

#[test]
fn effective_field_is_minus_the_energy_gradient() {
    let g = Geometry::square(4, 4, 1.0, [true, true]).unwrap();
    let params = HamiltonianParameters {
        mu_s: 2.0,
        external_field_magnitude: 1.5,
        external_field_normal: [1.0, 1.0, 1.0],
        anisotropy_magnitude: 0.2,
        anisotropy_normal: [0.3, 0.0, 1.0],
        exchange: vec![1.0, -0.3],
        dmi: vec![0.4],
        dmi_convention: DmiConvention::Surface {
            normal: [0.0, 0.0, 1.0],
            point: None,
        },
        four_spin: 0.1,
        ddi_radius: 4.5,
    };
    let topology = Topology::build(&g, &params).unwrap();
    let h = Hamiltonian::new(params, Arc::new(topology), g.nos()).unwrap();

    let mut spins = vec![[0.0; 3]; g.nos()];
    initial_states::random(&mut spins, 42);

    let only = |f: fn(&mut FieldMask)| {
        let mut m = FieldMask::NONE;
        f(&mut m);
        m
    };
    let masks = [
        ("zeeman", only(|m| m.zeeman = true)),
        ("anisotropy", only(|m| m.anisotropy = true)),
        ("exchange", only(|m| m.exchange = true)),
        ("dmi", only(|m| m.dmi = true)),
        ("four_spin", only(|m| m.four_spin = true)),
        ("dipole", only(|m| m.dipole = true)),
    ];

    let h_step = 1e-5;
    for (name, mask) in masks {
        let mut field = vec![[0.0; 3]; g.nos()];
        h.effective_field_masked(&spins, &mut field, mask);
        for i in [0, 5, 10, 15] {
            for d in 0..3 {
                let mut plus = spins.clone();
                let mut minus = spins.clone();
                plus[i][d] += h_step;
                minus[i][d] -= h_step;
                let de = (term(&h.energy(&plus), mask) - term(&h.energy(&minus), mask)) / (2.0 * h_step);
                assert!(
                    approx_eq(-de, field[i][d], 1e-6),
                    "{} field at site {} component {}: {} vs -dE/ds {}",
                    name,
                    i,
                    d,
                    field[i][d],
                    -de
                );
            }
        }
    }
}

#[test]
fn interrupted_run_still_saves_initial_and_final_snapshots() {
    let sink = SharedSink::default();
    let mut cfg = film_config(3);
    cfg.n_images = 2;
    cfg.initial_state = InitialState::Random { seed: 1 };

    let mut sim = Simulation::new(cfg).unwrap();
    let before = sim.chain().images().to_vec();
    let report = sim
        .run(Some(Box::new(sink.clone())), &AtomicBool::new(true))
        .unwrap();
    assert_eq!(report.stop_reason, SolverStopReason::Interrupted);
    assert_eq!(report.iterations, 0);
    assert_eq!(sim.chain().images(), &before[..]);

    let saved = sink.0.lock().unwrap();
    assert_eq!(
        *saved,
        vec![(0, 0, true, false), (0, 1, true, false), (0, 0, false, true), (0, 1, false, true)]
    );
}

#[test]
fn snapshots_follow_the_log_interval() {
    let sink = SharedSink::default();
    let mut cfg = two_spin_config();
    cfg.hamiltonian.external_field_magnitude = 1.0;
    cfg.llg.damping = 0.0;
    cfg.llg.n_iterations = 30;
    cfg.llg.n_iterations_log = 10;
    cfg.initial_state = InitialState::Homogeneous {
        direction: [1.0, 0.0, 0.0],
    };
    cfg.optimizer = OptimizerKind::Sib2;

    let mut sim = Simulation::new(cfg).unwrap();
    sim.run(Some(Box::new(sink.clone())), &AtomicBool::new(false)).unwrap();

    let saved = sink.0.lock().unwrap();
    let iterations: Vec<usize> = saved.iter().map(|s| s.0).collect();
    assert_eq!(iterations, vec![0, 10, 20, 30, 30]);
    assert!(saved[0].2 && !saved[0].3);
    assert!(!saved[4].2 && saved[4].3);
}

#[test]
fn non_finite_spins_abort_the_run() {
    let mut sim = Simulation::new(film_config(3)).unwrap();
    sim.chain_mut().image_mut(0)[4] = [f64::NAN, 0.0, 1.0];

    let mut solver = sim.solver(None).unwrap();
    let mut chain = sim.chain().clone();
    let err = solver.run(&mut chain, &AtomicBool::new(false)).unwrap_err();
    assert!(matches!(err, EngineError::NonFinite { .. }), "got {:?}", err);
    assert!(solver.method().is_finalized());
    assert_eq!(solver.iteration(), 0);
}

#[test]
fn temperature_gradient_heats_one_side() {
    let mut cfg = film_config(6);
    cfg.llg.temperature = 10.0;
    cfg.llg.temperature_gradient_direction = [1.0, 0.0, 0.0];
    cfg.llg.temperature_gradient_inclination = 2.0;
    let sim = Simulation::new(cfg).unwrap();
    let method = sim.method().unwrap();

    let g = sim.geometry();
    let centre = g.center();
    for (t, p) in method.temperature_distribution().iter().zip(g.positions()) {
        let expected = (10.0 + 2.0 * (p[0] - centre[0])).max(0.0);
        assert_abs_diff_eq!(*t, expected, epsilon = 1e-12);
    }
}
