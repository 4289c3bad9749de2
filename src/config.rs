// src/config.rs
//
// Run configuration: everything needed to set up a simulation, as one JSON
// document. Missing fields take their defaults; `from_json_str` validates.

use crate::error::Result;
use crate::geometry::Geometry;
use crate::initial_states::{self, SkyrmionSeed, SpiralDirection};
use crate::optimizer::OptimizerKind;
use crate::params::{HamiltonianParameters, LlgParameters};
use crate::vec3::Vec3;

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Basis atoms in units of the lattice constant.
    pub basis: Vec<Vec3>,
    pub translation_vectors: [Vec3; 3],
    pub n_cells: [usize; 3],
    /// Angstrom.
    pub lattice_constant: f64,
    pub periodic: [bool; 3],
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            basis: vec![[0.0; 3]],
            translation_vectors: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            n_cells: [10, 10, 1],
            lattice_constant: 1.0,
            periodic: [true, true, false],
        }
    }
}

impl GeometryConfig {
    pub fn build(&self) -> Result<Geometry> {
        Geometry::new(
            self.basis.clone(),
            self.translation_vectors,
            self.n_cells,
            self.lattice_constant,
            self.periodic,
        )
    }
}

/// Starting configuration applied to every image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitialState {
    PlusZ,
    MinusZ,
    Homogeneous {
        direction: Vec3,
    },
    /// Image k uses `seed + k`.
    Random {
        seed: u64,
    },
    /// Starts from +z and points the spins with x >= pos.x (or x < pos.x) along `direction`.
    DomainWall {
        pos: Vec3,
        direction: Vec3,
        #[serde(default = "default_true")]
        greater: bool,
    },
    /// Starts from the background (+z, or -z with `up_down`) and writes one skyrmion.
    Skyrmion(SkyrmionSeed),
    SpinSpiral {
        #[serde(default)]
        direction_type: SpiralDirection,
        q: Vec3,
        #[serde(default = "default_axis")]
        axis: Vec3,
        #[serde(default = "default_cone")]
        theta: f64,
    },
}

fn default_true() -> bool {
    true
}

fn default_axis() -> Vec3 {
    [0.0, 0.0, 1.0]
}

fn default_cone() -> f64 {
    90.0
}

impl Default for InitialState {
    fn default() -> Self {
        InitialState::PlusZ
    }
}

impl InitialState {
    pub fn apply(&self, geometry: &Geometry, spins: &mut [Vec3], idx_image: usize) {
        match self {
            InitialState::PlusZ => initial_states::plus_z(spins),
            InitialState::MinusZ => initial_states::minus_z(spins),
            InitialState::Homogeneous { direction } => initial_states::homogeneous(spins, *direction),
            InitialState::Random { seed } => initial_states::random(spins, seed.wrapping_add(idx_image as u64)),
            InitialState::DomainWall { pos, direction, greater } => {
                initial_states::plus_z(spins);
                initial_states::domain_wall(geometry, spins, *pos, *direction, *greater);
            }
            InitialState::Skyrmion(seed) => {
                if seed.up_down {
                    initial_states::minus_z(spins);
                } else {
                    initial_states::plus_z(spins);
                }
                initial_states::skyrmion(geometry, spins, seed);
            }
            InitialState::SpinSpiral {
                direction_type,
                q,
                axis,
                theta,
            } => initial_states::spin_spiral(geometry, spins, *direction_type, *q, *axis, *theta),
        }
    }
}

fn validate_simulation(cfg: &SimulationConfig) -> std::result::Result<(), ValidationError> {
    let g = &cfg.geometry;
    if g.basis.is_empty() {
        return Err(ValidationError::new("geometry basis must not be empty"));
    }
    if g.n_cells.iter().any(|&n| n == 0) {
        return Err(ValidationError::new("geometry n_cells must be >= 1"));
    }
    if !(g.lattice_constant.is_finite() && g.lattice_constant > 0.0) {
        return Err(ValidationError::new("lattice_constant must be positive"));
    }
    if let InitialState::Skyrmion(seed) = &cfg.initial_state {
        if !(seed.radius.is_finite() && seed.radius >= 0.0) {
            return Err(ValidationError::new("skyrmion radius must be >= 0"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_simulation"))]
pub struct SimulationConfig {
    pub geometry: GeometryConfig,
    #[validate]
    pub hamiltonian: HamiltonianParameters,
    #[validate]
    pub llg: LlgParameters,
    pub optimizer: OptimizerKind,
    #[validate(range(min = 1))]
    pub n_images: usize,
    pub initial_state: InitialState,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryConfig::default(),
            hamiltonian: HamiltonianParameters::default(),
            llg: LlgParameters::default(),
            optimizer: OptimizerKind::default(),
            n_images: 1,
            initial_state: InitialState::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: SimulationConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
