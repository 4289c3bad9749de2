// src/error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Gradient or spin values stopped being finite. The run is aborted.
    #[error("non-finite values after {stage} on image {image}")]
    NonFinite { stage: &'static str, image: usize },

    #[error("method already finalized, cannot call {operation}")]
    MethodFinalized { operation: &'static str },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("requested {requested} neighbour shells but the lattice only provides {available}")]
    ShellCountExceeded { requested: usize, available: usize },

    #[error("expected {expected} images, got {found}")]
    ImageCountMismatch { expected: usize, found: usize },

    #[error("expected {expected} spins per image, got {found}")]
    SiteCountMismatch { expected: usize, found: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] validator::ValidationErrors),

    #[error("could not parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint sink failed: {0}")]
    Checkpoint(String),
}
