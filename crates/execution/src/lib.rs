//! Execution layer - the optimization pipeline and its target-system seams.
//!
//! [`OptimizationPipeline`] turns candidate models into deployed changes and
//! watches them, rolling back through the [`TargetAdapter`] when a change does
//! not pay off.

#![warn(missing_docs)]

pub mod adapter;
pub mod memory_target;
pub mod json_target;
pub mod audit;
pub mod lock;
pub mod detect;
pub mod rank;
pub mod generate;
pub mod gate;
pub mod deploy;
pub mod monitor;
pub mod schedule;
pub mod engine;

pub use adapter::{apply_change, AdapterError, HealthMetrics, TargetAdapter};
pub use memory_target::InMemoryTarget;
pub use json_target::JsonFileTarget;
pub use audit::{AuditSink, MemoryAuditSink, TracingAuditSink};
pub use lock::AreaLocks;
pub use detect::{detect, DetectError};
pub use rank::{Ranker, Ranking};
pub use generate::{CandidateSynthesizer, DefaultSynthesizer, SynthesisError};
pub use gate::{GateDecision, ValidationGate};
pub use deploy::{DeployResult, Deployer};
pub use monitor::{Monitor, MonitorVerdict};
pub use schedule::{CycleScheduler, NextCycleSchedule, ScheduleError};
pub use engine::{OptimizationPipeline, PipelinePhase, PipelineReport, PipelineStatus};
