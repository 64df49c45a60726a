//! Venturi core data models.
//!
//! This crate defines the data structures shared by the fast-path batch
//! controller, the experience learner and the optimization pipeline.

#![warn(missing_docs)]

// Core identities
mod id;

// Telemetry and learning
mod observation;
mod experience;

// Optimization lifecycle
mod candidate;
mod deployment;
mod event;

// Cross-cutting
pub mod config;
mod error;

// Re-exports
pub use id::*;

pub use observation::{Metric, Observation, AREA_TAG, DEFAULT_AREA};
pub use experience::{
    default_traits, snapshot_traits, CognitiveTrait, Experience, TraitSnapshot,
};
pub use candidate::{
    CandidateModel, CandidateOptimization, Feature, Insight, ManualReviewItem, Opportunity,
    OpportunityKind, RollbackPlan, RollbackTrigger, TestCase,
};
pub use deployment::{DeploymentOutcome, DeploymentRecord, DeploymentStatus};
pub use event::{AuditEvent, AuditKind};
pub use config::{
    ConfigError, ControllerConfig, LearnerConfig, PipelineConfig, VenturiConfig,
};
pub use error::{OptimizerError, Result};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
