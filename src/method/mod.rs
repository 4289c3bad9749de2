// src/method/mod.rs
//
// A method turns spin configurations into forces and decides convergence.
// Optimizers move the spins; the solver loop sequences the two.
//
// Lifecycle per iteration:
//   hook_pre_iteration -> calculate_force -> calculate_force_virtual
//   -> (optimizer step) -> hook_post_iteration -> converged
// and, once, finalize. After finalize every per-iteration call is an error.

pub mod llg;
pub mod spin_torque;

pub use llg::MethodLlg;
pub use spin_torque::{directional_gradient, SpinTorqueField};

use crate::chain::Chain;
use crate::energy::EnergyBreakdown;
use crate::error::Result;
use crate::vec3::Vec3;
use crate::vector_field::VectorField;

use serde::Serialize;

pub trait Method: Send {
    fn name(&self) -> &'static str;

    fn n_images(&self) -> usize;

    fn nos(&self) -> usize;

    /// Effective field of every image, tangent to the spins, written to `forces`.
    fn calculate_force(&mut self, configurations: &[VectorField], forces: &mut [VectorField]) -> Result<()>;

    /// Rotation-generating term the optimizers integrate: ds/dt for the given forces.
    fn calculate_force_virtual(
        &self,
        configurations: &[VectorField],
        forces: &[VectorField],
        forces_virtual: &mut [VectorField],
    ) -> Result<()>;

    /// Scale a standard-normal field `xi` into the thermal field of image `idx_image`.
    fn thermal_field(&self, idx_image: usize, xi: &[Vec3], out: &mut [Vec3]) -> Result<()>;

    /// Current base temperature (K).
    fn temperature(&self) -> f64;

    /// Whether `thermal_field` can be non-zero anywhere. Stochastic optimizers
    /// skip the noise draw when this is false.
    fn has_thermal_noise(&self) -> bool {
        self.temperature() > 0.0
    }

    /// Per-image convergence of the last force evaluation.
    fn converged(&mut self) -> Result<&[bool]>;

    fn hook_pre_iteration(&mut self) -> Result<()>;

    fn hook_post_iteration(&mut self, chain: &Chain) -> Result<()>;

    /// Hand a snapshot of every image to the checkpoint sink. Between iterations only.
    fn save_current(
        &mut self,
        chain: &Chain,
        starttime: &str,
        iteration: usize,
        initial: bool,
        final_: bool,
    ) -> Result<()>;

    /// Largest tangential force component per image, from the last evaluation.
    fn max_torque(&self) -> &[f64];

    fn finalize(&mut self);

    fn is_finalized(&self) -> bool;
}

/// Read-only view of one image handed to a `CheckpointSink`.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<'a> {
    pub method: &'static str,
    pub starttime: &'a str,
    pub iteration: usize,
    pub idx_image: usize,
    pub initial: bool,
    #[serde(rename = "final")]
    pub final_: bool,
    /// Simulated time (ps).
    pub time: f64,
    pub energy: EnergyBreakdown,
    pub max_torque: f64,
    pub spins: &'a [Vec3],
}

pub trait CheckpointSink: Send {
    fn save(&mut self, snapshot: &Snapshot<'_>) -> Result<()>;
}

/// Owned copy of a snapshot, as kept by `MemorySink`.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSnapshot {
    pub iteration: usize,
    pub idx_image: usize,
    pub initial: bool,
    pub final_: bool,
    pub energy: f64,
    pub spins: VectorField,
}

/// Keeps every snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<SavedSnapshot>,
}

impl CheckpointSink for MemorySink {
    fn save(&mut self, snapshot: &Snapshot<'_>) -> Result<()> {
        self.saved.push(SavedSnapshot {
            iteration: snapshot.iteration,
            idx_image: snapshot.idx_image,
            initial: snapshot.initial,
            final_: snapshot.final_,
            energy: snapshot.energy.total(),
            spins: snapshot.spins.to_vec(),
        });
        Ok(())
    }
}
