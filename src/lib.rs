// src/lib.rs

pub mod chain;
pub mod config;
pub mod constants;
pub mod effective_field;
pub mod energy;
pub mod error;
pub mod geometry;
pub mod initial_states;
pub mod method;
pub mod neighbours;
pub mod optimizer;
pub mod params;
pub mod simulation;
pub mod solver;
pub mod vec3;
pub mod vector_field;

pub use chain::Chain;
pub use config::{GeometryConfig, InitialState, SimulationConfig};
pub use error::{EngineError, Result};
pub use geometry::Geometry;
pub use simulation::Simulation;
pub use solver::{Solver, SolverReport, SolverStopReason};
