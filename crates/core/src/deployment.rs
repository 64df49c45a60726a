//! Deployment records and outcome telemetry.

use crate::id::{BackupRef, CandidateId, DeploymentId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Applied and live
    Active,
    /// Reverted after monitoring
    RolledBack,
    /// Deploy step failed and was reverted
    Failed,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentStatus::Active => write!(f, "active"),
            DeploymentStatus::RolledBack => write!(f, "rolled_back"),
            DeploymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Audit record of one deployment attempt. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Unique identifier
    pub id: DeploymentId,

    /// Candidate that was deployed
    pub candidate_id: CandidateId,

    /// Target area
    pub target_area: String,

    /// When the deploy started
    pub deployed_at: Time,

    /// Backup taken before apply (None if the backup itself failed)
    pub backup_ref: Option<BackupRef>,

    /// Current status
    pub status: DeploymentStatus,

    /// Measured effectiveness, once monitored
    pub effectiveness_score: Option<f64>,

    /// Measured error rate, once monitored
    pub error_rate: Option<f64>,

    /// Why it failed or was rolled back
    pub reason: Option<String>,

    /// When monitoring concluded (or the deploy failed)
    pub concluded_at: Option<Time>,

    /// Rollback decided but not yet carried out, with its reason
    #[serde(default)]
    pub pending_rollback: Option<String>,
}

impl DeploymentRecord {
    /// A fresh active record.
    pub fn active(candidate_id: CandidateId, target_area: impl Into<String>, backup_ref: BackupRef) -> Self {
        Self {
            id: DeploymentId::new(),
            candidate_id,
            target_area: target_area.into(),
            deployed_at: chrono::Utc::now(),
            backup_ref: Some(backup_ref),
            status: DeploymentStatus::Active,
            effectiveness_score: None,
            error_rate: None,
            reason: None,
            concluded_at: None,
            pending_rollback: None,
        }
    }

    /// A record for a deploy that failed before or during apply.
    pub fn failed(
        candidate_id: CandidateId,
        target_area: impl Into<String>,
        backup_ref: Option<BackupRef>,
        reason: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: DeploymentId::new(),
            candidate_id,
            target_area: target_area.into(),
            deployed_at: now,
            backup_ref,
            status: DeploymentStatus::Failed,
            effectiveness_score: None,
            error_rate: None,
            reason: Some(reason.into()),
            concluded_at: Some(now),
            pending_rollback: None,
        }
    }

    /// Mark as rolled back after monitoring.
    pub fn mark_rolled_back(&mut self, reason: impl Into<String>) {
        self.status = DeploymentStatus::RolledBack;
        self.reason = Some(reason.into());
        self.concluded_at = Some(chrono::Utc::now());
        self.pending_rollback = None;
    }

    /// Record that a rollback is owed because the restore could not run yet.
    pub fn mark_rollback_pending(&mut self, reason: impl Into<String>) {
        self.pending_rollback = Some(reason.into());
    }

    /// Mark monitoring as concluded with the change kept.
    pub fn mark_kept(&mut self) {
        self.concluded_at = Some(chrono::Utc::now());
    }

    /// Whether the deployment is live.
    pub fn is_active(&self) -> bool {
        self.status == DeploymentStatus::Active
    }

    /// Outcome telemetry for the learner's feedback channel.
    pub fn outcome(&self) -> DeploymentOutcome {
        DeploymentOutcome {
            deployment_id: self.id,
            target_area: self.target_area.clone(),
            status: self.status,
            effectiveness_score: self.effectiveness_score,
            error_rate: self.error_rate,
            observed_at: self.concluded_at.unwrap_or(self.deployed_at),
        }
    }
}

/// Outcome of a concluded deployment, fed back into the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    /// Deployment this outcome describes
    pub deployment_id: DeploymentId,
    /// Target area
    pub target_area: String,
    /// Final status
    pub status: DeploymentStatus,
    /// Measured effectiveness, if any
    pub effectiveness_score: Option<f64>,
    /// Measured error rate, if any
    pub error_rate: Option<f64>,
    /// When the outcome was determined
    pub observed_at: Time,
}

impl DeploymentOutcome {
    /// Whether the change was kept.
    pub fn succeeded(&self) -> bool {
        self.status == DeploymentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_record_starts_unmonitored() {
        let r = DeploymentRecord::active(CandidateId::new(), "ingest", BackupRef::generate());
        assert!(r.is_active());
        assert!(r.effectiveness_score.is_none());
        assert!(r.concluded_at.is_none());
    }

    #[test]
    fn test_rolled_back_outcome() {
        let mut r = DeploymentRecord::active(CandidateId::new(), "ingest", BackupRef::generate());
        r.effectiveness_score = Some(0.3);
        r.mark_rolled_back("effectiveness below threshold");
        let outcome = r.outcome();
        assert_eq!(outcome.status, DeploymentStatus::RolledBack);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.effectiveness_score, Some(0.3));
    }

    #[test]
    fn test_pending_rollback_survives_serde_and_clears() {
        let mut r = DeploymentRecord::active(CandidateId::new(), "ingest", BackupRef::generate());
        r.mark_rollback_pending("error rate exceeded");
        let json = serde_json::to_string(&r).unwrap();
        let mut loaded: DeploymentRecord = serde_json::from_str(&json).unwrap();
        assert!(loaded.is_active());
        assert_eq!(loaded.pending_rollback.as_deref(), Some("error rate exceeded"));

        loaded.mark_rolled_back("error rate exceeded");
        assert!(loaded.pending_rollback.is_none());
    }

    #[test]
    fn test_records_without_pending_field_still_load() {
        let r = DeploymentRecord::active(CandidateId::new(), "ingest", BackupRef::generate());
        let mut value = serde_json::to_value(&r).unwrap();
        value.as_object_mut().unwrap().remove("pending_rollback");
        let loaded: DeploymentRecord = serde_json::from_value(value).unwrap();
        assert!(loaded.pending_rollback.is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DeploymentStatus::RolledBack.to_string(), "rolled_back");
        assert_eq!(
            serde_json::to_string(&DeploymentStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}
