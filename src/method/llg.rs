// src/method/llg.rs
//
// Landau-Lifshitz-Gilbert method.
//
//   ds/dt = -gamma s x F - gamma alpha s x (s x F)
//
// with F = -dE/ds the effective field (meV) and gamma in rad / (ps meV).
// With `direct_minimization` only the damping term is kept, with alpha = 1, so
// the dynamics is a pure descent in energy.
//
// The gradient buffer holds the tangential part F - (F.s) s, which leaves the
// dynamics unchanged and vanishes at a stationary state. Convergence is judged
// on it. A spin-transfer torque field is added to the forces only, so a state
// held by the current against the Hamiltonian does not count as converged.

use super::spin_torque::SpinTorqueField;
use super::{CheckpointSink, Method, Snapshot};
use crate::chain::Chain;
use crate::constants::K_B;
use crate::effective_field::Hamiltonian;
use crate::error::{EngineError, Result};
use crate::geometry::Geometry;
use crate::params::LlgParameters;
use crate::vec3::{cross, dot, is_finite, normalize, sub, tangential, Vec3};
use crate::vector_field::VectorField;

use rayon::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    InIteration,
    Terminated,
}

pub struct MethodLlg {
    geometry: Arc<Geometry>,
    hamiltonian: Hamiltonian,
    parameters: LlgParameters,
    n_images: usize,

    gradient: Vec<VectorField>,
    force_converged: Vec<bool>,
    max_torque: Vec<f64>,
    energies: Vec<f64>,

    temperature: f64,
    temperature_distribution: Vec<f64>,
    spin_torque: Option<SpinTorqueField>,

    phase: Phase,
    iteration: usize,
    time: f64,
    sink: Option<Box<dyn CheckpointSink>>,
}

impl MethodLlg {
    pub fn new(
        geometry: Arc<Geometry>,
        hamiltonian: Hamiltonian,
        parameters: LlgParameters,
        n_images: usize,
    ) -> Result<Self> {
        let nos = geometry.nos();
        if hamiltonian.nos() != nos {
            return Err(EngineError::SiteCountMismatch {
                expected: nos,
                found: hamiltonian.nos(),
            });
        }
        let spin_torque = parameters
            .spin_torque
            .map(|torque| SpinTorqueField::new(torque, &geometry, hamiltonian.topology()));
        let mut method = Self {
            geometry,
            hamiltonian,
            n_images,
            gradient: vec![vec![[0.0; 3]; nos]; n_images],
            force_converged: vec![false; n_images],
            max_torque: vec![f64::INFINITY; n_images],
            energies: vec![0.0; n_images],
            temperature: parameters.temperature,
            temperature_distribution: vec![parameters.temperature; nos],
            spin_torque,
            parameters,
            phase: Phase::Idle,
            iteration: 0,
            time: 0.0,
            sink: None,
        };
        method.update_temperature_distribution();
        Ok(method)
    }

    /// Register where `save_current` sends snapshots.
    pub fn with_sink(mut self, sink: Box<dyn CheckpointSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn CheckpointSink>>) {
        self.sink = sink;
    }

    pub fn take_sink(&mut self) -> Option<Box<dyn CheckpointSink>> {
        self.sink.take()
    }

    pub fn parameters(&self) -> &LlgParameters {
        &self.parameters
    }

    /// Mutable access to the parameters; previous convergence flags are discarded.
    pub fn parameters_mut(&mut self) -> &mut LlgParameters {
        self.reset_convergence();
        &mut self.parameters
    }

    pub fn hamiltonian(&self) -> &Hamiltonian {
        &self.hamiltonian
    }

    /// Mutable access to the Hamiltonian; previous convergence flags are discarded.
    pub fn hamiltonian_mut(&mut self) -> &mut Hamiltonian {
        self.reset_convergence();
        &mut self.hamiltonian
    }

    /// Forget convergence state after an external change of parameters or spins.
    pub fn reset_convergence(&mut self) {
        self.force_converged.iter_mut().for_each(|c| *c = false);
        self.max_torque.iter_mut().for_each(|t| *t = f64::INFINITY);
    }

    pub fn gradient(&self, idx_image: usize) -> &[Vec3] {
        &self.gradient[idx_image]
    }

    pub fn temperature_distribution(&self) -> &[f64] {
        &self.temperature_distribution
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Simulated time (ps).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Energies recorded by the last `hook_post_iteration` that computed them.
    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    fn ensure_active(&self, operation: &'static str) -> Result<()> {
        if self.phase == Phase::Terminated {
            return Err(EngineError::MethodFinalized { operation });
        }
        Ok(())
    }

    fn check_shapes(&self, configurations: &[VectorField], buffers: usize) -> Result<()> {
        if configurations.len() != self.n_images {
            return Err(EngineError::ImageCountMismatch {
                expected: self.n_images,
                found: configurations.len(),
            });
        }
        if buffers != self.n_images {
            return Err(EngineError::ImageCountMismatch {
                expected: self.n_images,
                found: buffers,
            });
        }
        let nos = self.geometry.nos();
        if let Some(bad) = configurations.iter().find(|c| c.len() != nos) {
            return Err(EngineError::SiteCountMismatch {
                expected: nos,
                found: bad.len(),
            });
        }
        Ok(())
    }

    /// Rebuild the torque field after `parameters_mut` changed the torque.
    fn sync_spin_torque(&mut self) {
        let wanted = self.parameters.spin_torque;
        if wanted != self.spin_torque.as_ref().map(SpinTorqueField::torque) {
            self.spin_torque =
                wanted.map(|torque| SpinTorqueField::new(torque, &self.geometry, self.hamiltonian.topology()));
        }
    }

    /// T_i = T + inclination * (d . (r_i - centre)), clamped at zero.
    fn update_temperature_distribution(&mut self) {
        let t = self.temperature;
        let inclination = self.parameters.temperature_gradient_inclination;
        if inclination == 0.0 {
            self.temperature_distribution.iter_mut().for_each(|ti| *ti = t);
            return;
        }
        let direction = normalize(self.parameters.temperature_gradient_direction);
        let centre = self.geometry.center();
        for (ti, p) in self
            .temperature_distribution
            .iter_mut()
            .zip(self.geometry.positions())
        {
            *ti = (t + inclination * dot(direction, sub(*p, centre))).max(0.0);
        }
    }
}

impl Method for MethodLlg {
    fn name(&self) -> &'static str {
        "LLG"
    }

    fn n_images(&self) -> usize {
        self.n_images
    }

    fn nos(&self) -> usize {
        self.geometry.nos()
    }

    fn calculate_force(&mut self, configurations: &[VectorField], forces: &mut [VectorField]) -> Result<()> {
        self.ensure_active("calculate_force")?;
        self.check_shapes(configurations, forces.len())?;
        self.sync_spin_torque();

        let hamiltonian = &self.hamiltonian;
        let gamma = self.parameters.gamma;
        let spin_torque = if self.parameters.direct_minimization {
            None
        } else {
            self.spin_torque.as_ref()
        };
        self.gradient
            .par_iter_mut()
            .zip(forces.par_iter_mut())
            .zip(configurations.par_iter())
            .enumerate()
            .try_for_each(|(image, ((gradient, force), spins))| {
                hamiltonian.effective_field(spins, gradient);
                for (g, s) in gradient.iter_mut().zip(spins.iter()) {
                    *g = tangential(*g, *s);
                    if !is_finite(*g) {
                        return Err(EngineError::NonFinite {
                            stage: "calculate_force",
                            image,
                        });
                    }
                }
                force.clear();
                force.extend_from_slice(&gradient[..]);
                if let Some(stt) = spin_torque {
                    stt.add_to(spins, gamma, force);
                }
                Ok(())
            })?;

        let norm = self.parameters.convergence_norm;
        for (torque, gradient) in self.max_torque.iter_mut().zip(&self.gradient) {
            *torque = norm.evaluate(gradient);
        }
        Ok(())
    }

    fn calculate_force_virtual(
        &self,
        configurations: &[VectorField],
        forces: &[VectorField],
        forces_virtual: &mut [VectorField],
    ) -> Result<()> {
        self.ensure_active("calculate_force_virtual")?;
        self.check_shapes(configurations, forces.len())?;
        if forces_virtual.len() != self.n_images {
            return Err(EngineError::ImageCountMismatch {
                expected: self.n_images,
                found: forces_virtual.len(),
            });
        }

        let gamma = self.parameters.gamma;
        let (precession, damping) = if self.parameters.direct_minimization {
            (0.0, gamma)
        } else {
            (gamma, gamma * self.parameters.damping)
        };

        forces_virtual
            .par_iter_mut()
            .zip(forces.par_iter())
            .zip(configurations.par_iter())
            .for_each(|((virt, force), spins)| {
                virt.resize(spins.len(), [0.0; 3]);
                for ((v, f), s) in virt.iter_mut().zip(force.iter()).zip(spins.iter()) {
                    let sxf = cross(*s, *f);
                    let sxsxf = cross(*s, sxf);
                    *v = [
                        -precession * sxf[0] - damping * sxsxf[0],
                        -precession * sxf[1] - damping * sxsxf[1],
                        -precession * sxf[2] - damping * sxsxf[2],
                    ];
                }
            });
        Ok(())
    }

    fn thermal_field(&self, idx_image: usize, xi: &[Vec3], out: &mut [Vec3]) -> Result<()> {
        self.ensure_active("thermal_field")?;
        if idx_image >= self.n_images {
            return Err(EngineError::ImageCountMismatch {
                expected: self.n_images,
                found: idx_image + 1,
            });
        }
        let nos = self.geometry.nos();
        if xi.len() != nos || out.len() != nos {
            return Err(EngineError::SiteCountMismatch {
                expected: nos,
                found: xi.len().min(out.len()),
            });
        }
        // sigma_i = sqrt(2 alpha k_B T_i / (gamma dt)), in meV.
        let p = &self.parameters;
        let base = 2.0 * p.damping * K_B / (p.gamma * p.dt);
        for ((o, x), t) in out.iter_mut().zip(xi).zip(&self.temperature_distribution) {
            let sigma = (base * t).sqrt();
            *o = [sigma * x[0], sigma * x[1], sigma * x[2]];
        }
        Ok(())
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    /// True when any site is hot, which a temperature gradient allows at T = 0.
    fn has_thermal_noise(&self) -> bool {
        self.parameters.damping > 0.0 && self.temperature_distribution.iter().any(|t| *t > 0.0)
    }

    fn converged(&mut self) -> Result<&[bool]> {
        self.ensure_active("converged")?;
        let tolerance = self.parameters.force_convergence;
        for (flag, torque) in self.force_converged.iter_mut().zip(&self.max_torque) {
            *flag = *torque < tolerance;
        }
        Ok(&self.force_converged)
    }

    fn hook_pre_iteration(&mut self) -> Result<()> {
        self.ensure_active("hook_pre_iteration")?;
        if self.phase == Phase::InIteration {
            return Err(EngineError::Protocol(
                "hook_pre_iteration called twice without hook_post_iteration".into(),
            ));
        }
        self.phase = Phase::InIteration;

        self.temperature = self
            .parameters
            .temperature_schedule
            .temperature_at(self.parameters.temperature, self.iteration);
        self.update_temperature_distribution();

        if let Some(ramp) = self.parameters.field_ramp {
            let current = self.hamiltonian.params().external_field_magnitude;
            let next = ramp.step(current);
            if next != current {
                self.hamiltonian.set_external_field_magnitude(next);
            }
        }
        Ok(())
    }

    fn hook_post_iteration(&mut self, chain: &Chain) -> Result<()> {
        self.ensure_active("hook_post_iteration")?;
        if self.phase != Phase::InIteration {
            return Err(EngineError::Protocol(
                "hook_post_iteration called without a matching hook_pre_iteration".into(),
            ));
        }
        self.phase = Phase::Idle;
        self.iteration += 1;
        self.time += self.parameters.dt;

        let log_every = self.parameters.n_iterations_log;
        if log_every > 0 && self.iteration % log_every == 0 {
            for (energy, spins) in self.energies.iter_mut().zip(chain.images()) {
                *energy = self.hamiltonian.energy(spins).total();
            }
        }

        tracing::debug!(
            iteration = self.iteration,
            time_ps = self.time,
            temperature = self.temperature,
            max_torque = ?self.max_torque,
            "LLG iteration"
        );
        Ok(())
    }

    fn save_current(
        &mut self,
        chain: &Chain,
        starttime: &str,
        iteration: usize,
        initial: bool,
        final_: bool,
    ) -> Result<()> {
        if self.phase == Phase::InIteration {
            return Err(EngineError::Protocol(
                "save_current called inside an iteration".into(),
            ));
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        for (idx_image, spins) in chain.images().iter().enumerate() {
            let energy = self.hamiltonian.energy(spins);
            let snapshot = Snapshot {
                method: "LLG",
                starttime,
                iteration,
                idx_image,
                initial,
                final_,
                time: self.time,
                energy,
                max_torque: self.max_torque.get(idx_image).copied().unwrap_or(f64::NAN),
                spins,
            };
            sink.save(&snapshot)?;
        }
        Ok(())
    }

    fn max_torque(&self) -> &[f64] {
        &self.max_torque
    }

    fn finalize(&mut self) {
        if self.phase != Phase::Terminated {
            tracing::debug!(iteration = self.iteration, "LLG method finalized");
        }
        self.phase = Phase::Terminated;
    }

    fn is_finalized(&self) -> bool {
        self.phase == Phase::Terminated
    }
}
