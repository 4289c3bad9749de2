// src/solver.rs
//
// Solver loop: drives a method and an optimizer over a chain until every image
// is converged, the iteration cap is reached, or an interrupt is observed.
//
// Per iteration:
//   hook_pre_iteration -> calculate_force -> calculate_force_virtual
//   -> optimizer.iteration -> hook_post_iteration -> converged
//
// The interrupt flag is only checked between iterations, so a stopped run
// always leaves every image in a consistent state.

use crate::chain::Chain;
use crate::error::{EngineError, Result};
use crate::method::Method;
use crate::optimizer::Optimizer;
use crate::vector_field::VectorField;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStopReason {
    /// Every image satisfied the convergence test.
    Converged,
    /// Iteration cap reached.
    MaxIterations,
    /// The interrupt flag was raised.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct SolverReport {
    pub iterations: usize,
    pub stop_reason: SolverStopReason,
    pub converged: Vec<bool>,
    pub max_torque: Vec<f64>,
    pub wall_time_s: f64,
}

pub struct Solver {
    method: Box<dyn Method>,
    optimizer: Box<dyn Optimizer>,
    forces: Vec<VectorField>,
    forces_virtual: Vec<VectorField>,
    n_iterations: usize,
    n_iterations_log: usize,
    iteration: usize,
    converged: Vec<bool>,
}

impl Solver {
    pub fn new(
        method: Box<dyn Method>,
        optimizer: Box<dyn Optimizer>,
        n_iterations: usize,
        n_iterations_log: usize,
    ) -> Self {
        let buffers = vec![vec![[0.0; 3]; method.nos()]; method.n_images()];
        let converged = vec![false; method.n_images()];
        Self {
            method,
            optimizer,
            forces: buffers.clone(),
            forces_virtual: buffers,
            n_iterations,
            n_iterations_log,
            iteration: 0,
            converged,
        }
    }

    pub fn method(&self) -> &dyn Method {
        self.method.as_ref()
    }

    pub fn method_mut(&mut self) -> &mut dyn Method {
        self.method.as_mut()
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    /// Iterations completed so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Last forces handed to the optimizer.
    pub fn forces(&self) -> &[VectorField] {
        &self.forces
    }

    fn check_chain(&self, chain: &Chain) -> Result<()> {
        if chain.n_images() != self.method.n_images() {
            return Err(EngineError::ImageCountMismatch {
                expected: self.method.n_images(),
                found: chain.n_images(),
            });
        }
        Ok(())
    }

    /// One complete iteration. Returns true when every image is converged.
    ///
    /// An error is terminal: the method is finalized before it is returned, so
    /// a failed step cannot be resumed mid-iteration.
    pub fn iterate(&mut self, chain: &mut Chain) -> Result<bool> {
        self.check_chain(chain)?;
        match self.step(chain) {
            Ok(converged) => Ok(converged),
            Err(e) => {
                if !self.method.is_finalized() {
                    tracing::warn!(error = %e, iteration = self.iteration, "iteration failed");
                    self.method.finalize();
                }
                Err(e)
            }
        }
    }

    fn step(&mut self, chain: &mut Chain) -> Result<bool> {
        let method = self.method.as_mut();

        method.hook_pre_iteration()?;
        method.calculate_force(chain.images(), &mut self.forces)?;
        method.calculate_force_virtual(chain.images(), &self.forces, &mut self.forces_virtual)?;
        self.optimizer.iteration(method, chain, &self.forces_virtual)?;
        chain.check_finite("optimizer iteration")?;
        method.hook_post_iteration(chain)?;
        self.iteration += 1;

        let flags = method.converged()?;
        self.converged.clear();
        self.converged.extend_from_slice(flags);
        Ok(flags.iter().all(|&c| c))
    }

    /// Run to completion. On error the method is finalized before returning it.
    pub fn run(&mut self, chain: &mut Chain, interrupted: &AtomicBool) -> Result<SolverReport> {
        let started = Instant::now();
        let starttime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|_| "0".to_string());

        tracing::info!(
            method = self.method.name(),
            optimizer = self.optimizer.full_name(),
            n_images = chain.n_images(),
            nos = chain.nos(),
            n_iterations = self.n_iterations,
            "solver started"
        );

        let result = self.run_loop(chain, interrupted, &starttime);
        let stop_reason = match result {
            Ok(reason) => reason,
            Err(e) => {
                tracing::warn!(error = %e, iteration = self.iteration, "solver aborted");
                self.method.finalize();
                return Err(e);
            }
        };

        let saved = self
            .method
            .save_current(chain, &starttime, self.iteration, false, true);
        self.method.finalize();
        saved?;

        let report = SolverReport {
            iterations: self.iteration,
            stop_reason,
            converged: self.converged.clone(),
            max_torque: self.method.max_torque().to_vec(),
            wall_time_s: started.elapsed().as_secs_f64(),
        };
        tracing::info!(
            iterations = report.iterations,
            stop = ?report.stop_reason,
            max_torque = ?report.max_torque,
            wall_time_s = report.wall_time_s,
            "solver finished"
        );
        Ok(report)
    }

    fn run_loop(&mut self, chain: &mut Chain, interrupted: &AtomicBool, starttime: &str) -> Result<SolverStopReason> {
        self.check_chain(chain)?;
        chain.check_finite("initial configuration")?;
        self.method.save_current(chain, starttime, self.iteration, true, false)?;

        while self.iteration < self.n_iterations {
            if interrupted.load(Ordering::Relaxed) {
                tracing::info!(iteration = self.iteration, "solver interrupted");
                return Ok(SolverStopReason::Interrupted);
            }

            let converged = self.iterate(chain)?;

            if self.n_iterations_log > 0 && self.iteration % self.n_iterations_log == 0 {
                tracing::info!(
                    iteration = self.iteration,
                    max_torque = ?self.method.max_torque(),
                    "solver progress"
                );
                self.method.save_current(chain, starttime, self.iteration, false, false)?;
            }

            if converged {
                return Ok(SolverStopReason::Converged);
            }
        }
        Ok(SolverStopReason::MaxIterations)
    }
}
