//! Venturi runtime - wires the fast path, the learner and the pipeline.
//!
//! ```text
//! observe() ──► SharedController (inline)
//!     │
//!     └─► bounded telemetry queue ──► run_cycle():
//!             learner.run_cycle → pipeline.run → outcomes → learner
//! ```

#![warn(missing_docs, unused_crate_dependencies)]

mod optimizer;

pub use optimizer::{CycleReport, Optimizer, RuntimeStatus, SNAPSHOT_KEY};

use venturi_core::ConfigError;
use venturi_storage::StorageError;

/// Runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// `spawn` was called while a background task is running
    #[error("Background task already running")]
    AlreadyRunning,
}
