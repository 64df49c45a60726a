//! Reflection layer - learns from runtime experience.
//!
//! The [`ExperienceLearner`] keeps a bounded ring buffer of experiences and a
//! small set of cognitive traits, and turns each batch of telemetry into a
//! [`venturi_core::CandidateModel`] for the optimization pipeline.

#![warn(missing_docs, unused_crate_dependencies)]

mod buffer;
mod intake;
mod analyzer;
mod evolution;
mod model;
mod engine;

pub use buffer::RingBuffer;
pub use intake::{EnvironmentContext, IntakeBatch, IntakeFilter};
pub use analyzer::{Analyzer, OUTCOME_METRIC};
pub use evolution::{TraitAdjustment, TraitEvolver};
pub use model::OpportunityBuilder;
pub use engine::{ExperienceLearner, LearnerSnapshot};

use venturi_core::OptimizerError;

/// Reflection errors.
#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    /// The environment context cannot score telemetry
    #[error("invalid environment context: {0}")]
    InvalidContext(String),
}

impl From<ReflectionError> for OptimizerError {
    fn from(e: ReflectionError) -> Self {
        OptimizerError::CycleSkipped(e.to_string())
    }
}
