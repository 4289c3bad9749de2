// src/simulation.rs
//
// Simulation context: one geometry, its neighbour topology and a chain of spin
// images, built from a `SimulationConfig`. Geometry and topology are shared
// read-only with every method created from it.

use crate::chain::Chain;
use crate::config::SimulationConfig;
use crate::effective_field::Hamiltonian;
use crate::energy::EnergyBreakdown;
use crate::error::{EngineError, Result};
use crate::geometry::Geometry;
use crate::method::{CheckpointSink, MethodLlg};
use crate::neighbours::Topology;
use crate::optimizer::build_optimizer;
use crate::solver::{Solver, SolverReport};

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub struct Simulation {
    config: SimulationConfig,
    geometry: Arc<Geometry>,
    topology: Arc<Topology>,
    chain: Chain,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let geometry = Arc::new(config.geometry.build()?);
        let topology = Arc::new(Topology::build(&geometry, &config.hamiltonian)?);

        let mut chain = Chain::new(config.n_images, geometry.nos());
        for (idx, image) in chain.images_mut().iter_mut().enumerate() {
            config.initial_state.apply(&geometry, image, idx);
        }
        chain.check_finite("initial state")?;

        tracing::info!(
            nos = geometry.nos(),
            n_images = config.n_images,
            n_shells = topology.shells.n_shells(),
            dmi = topology.dmi.is_some(),
            four_spin = topology.four_spin.is_some(),
            dipole_pairs = topology.dipole.as_ref().map_or(0, |d| d.len()),
            "simulation set up"
        );

        Ok(Self {
            config,
            geometry,
            topology,
            chain,
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Self::new(SimulationConfig::from_json_str(s)?)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut Chain {
        &mut self.chain
    }

    pub fn hamiltonian(&self) -> Result<Hamiltonian> {
        Hamiltonian::new(
            self.config.hamiltonian.clone(),
            Arc::clone(&self.topology),
            self.geometry.nos(),
        )
    }

    /// A fresh LLG method over this system, using the configured parameters.
    pub fn method(&self) -> Result<MethodLlg> {
        MethodLlg::new(
            Arc::clone(&self.geometry),
            self.hamiltonian()?,
            self.config.llg.clone(),
            self.config.n_images,
        )
    }

    /// Solver with the configured optimizer; snapshots go to `sink` when given.
    pub fn solver(&self, sink: Option<Box<dyn CheckpointSink>>) -> Result<Solver> {
        let mut method = self.method()?;
        method.set_sink(sink);
        let optimizer = build_optimizer(
            self.config.optimizer,
            self.config.n_images,
            self.geometry.nos(),
            &self.config.llg,
        );
        Ok(Solver::new(
            Box::new(method),
            optimizer,
            self.config.llg.n_iterations,
            self.config.llg.n_iterations_log,
        ))
    }

    /// Run the configured solver on the chain in place.
    pub fn run(&mut self, sink: Option<Box<dyn CheckpointSink>>, interrupted: &AtomicBool) -> Result<SolverReport> {
        let mut solver = self.solver(sink)?;
        solver.run(&mut self.chain, interrupted)
    }

    pub fn energy(&self, idx_image: usize) -> Result<EnergyBreakdown> {
        if idx_image >= self.chain.n_images() {
            return Err(EngineError::ImageCountMismatch {
                expected: self.chain.n_images(),
                found: idx_image + 1,
            });
        }
        Ok(self.hamiltonian()?.energy(self.chain.image(idx_image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitialState;
    use crate::solver::SolverStopReason;

    fn small_config() -> SimulationConfig {
        let mut cfg = SimulationConfig::default();
        cfg.geometry.n_cells = [4, 4, 1];
        cfg.hamiltonian.exchange = vec![1.0];
        cfg.llg.n_iterations = 50;
        cfg.llg.n_iterations_log = 10;
        cfg
    }

    #[test]
    fn setup_applies_initial_state_per_image() {
        let mut cfg = small_config();
        cfg.n_images = 3;
        cfg.initial_state = InitialState::Random { seed: 5 };
        let sim = Simulation::new(cfg).unwrap();
        assert_eq!(sim.chain().n_images(), 3);
        assert_eq!(sim.chain().nos(), 16);
        assert_ne!(sim.chain().image(0), sim.chain().image(1));
        assert!(sim.chain().max_norm_deviation() < 1e-12);
    }

    #[test]
    fn ferromagnet_is_already_converged() {
        let mut sim = Simulation::new(small_config()).unwrap();
        let report = sim.run(None, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.stop_reason, SolverStopReason::Converged);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.converged, vec![true]);
    }

    #[test]
    fn energy_of_uniform_state() {
        let sim = Simulation::new(small_config()).unwrap();
        // 16 sites, 4 first-shell neighbours each, E = -1/2 * 16 * 4 * J.
        let e = sim.energy(0).unwrap();
        assert!((e.exchange + 32.0).abs() < 1e-12, "exchange = {}", e.exchange);
        assert!(sim.energy(1).is_err());
    }

    #[test]
    fn bad_topology_request_fails_setup() {
        let mut cfg = small_config();
        cfg.geometry.n_cells = [1, 1, 1];
        cfg.geometry.periodic = [false; 3];
        assert!(matches!(
            Simulation::new(cfg),
            Err(EngineError::ShellCountExceeded { .. })
        ));
    }
}
