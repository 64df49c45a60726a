//! Audit event model - the optimizer's timeline.

use crate::id::EventId;
use crate::Time;
use serde::{Deserialize, Serialize};

/// What kind of thing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Pipeline moved from one phase to another
    PhaseTransition,
    /// A phase failed and fell back to its degraded path
    PhaseDegraded,
    /// A candidate failed the validation gate
    ValidationRejected,
    /// A generation failure was filed for manual review
    ManualReviewFiled,
    /// A candidate was deferred because its area is busy
    Deferred,
    /// A candidate was deployed
    Deployed,
    /// A deploy step failed and was reverted
    DeployFailed,
    /// A deployment was rolled back after monitoring
    RolledBack,
    /// A deployment passed monitoring
    Kept,
    /// The target adapter could not be reached
    AdapterUnavailable,
    /// The adapter has been unavailable repeatedly
    AdapterDegraded,
}

impl AuditKind {
    /// Stable name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::PhaseTransition => "phase_transition",
            AuditKind::PhaseDegraded => "phase_degraded",
            AuditKind::ValidationRejected => "validation_rejected",
            AuditKind::ManualReviewFiled => "manual_review_filed",
            AuditKind::Deferred => "deferred",
            AuditKind::Deployed => "deployed",
            AuditKind::DeployFailed => "deploy_failed",
            AuditKind::RolledBack => "rolled_back",
            AuditKind::Kept => "kept",
            AuditKind::AdapterUnavailable => "adapter_unavailable",
            AuditKind::AdapterDegraded => "adapter_degraded",
        }
    }
}

/// An atomic entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier
    pub id: EventId,

    /// When it happened
    pub timestamp: Time,

    /// What happened
    pub kind: AuditKind,

    /// What it happened to (candidate id, deployment id, area or phase)
    pub subject: String,

    /// Details
    pub message: String,
}

impl AuditEvent {
    /// Create a new event.
    pub fn new(kind: AuditKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            timestamp: chrono::Utc::now(),
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}
