//! Deploy phase: backup, apply, verify under a timeout; restore on failure.

use crate::adapter::{AdapterError, TargetAdapter};
use crate::lock::AreaLocks;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};
use venturi_core::{BackupRef, CandidateOptimization, DeploymentRecord};

/// Result of deploying one candidate.
#[derive(Debug)]
pub enum DeployResult {
    /// Applied and verified; the area stays locked until monitoring ends
    Deployed(DeploymentRecord),
    /// Apply or verify failed (or timed out) and the area was restored
    Failed {
        /// Failed record
        record: DeploymentRecord,
        /// Whether the restore also failed
        restore_failed: bool,
    },
    /// The area already has an in-flight change
    Deferred,
    /// The adapter could not be reached before anything changed
    Unavailable(String),
}

/// Deploys candidates one at a time.
pub struct Deployer<'a> {
    adapter: &'a dyn TargetAdapter,
    locks: &'a AreaLocks,
    deploy_timeout: Duration,
}

impl<'a> Deployer<'a> {
    /// Create a deployer.
    pub fn new(adapter: &'a dyn TargetAdapter, locks: &'a AreaLocks, deploy_timeout: Duration) -> Self {
        Self {
            adapter,
            locks,
            deploy_timeout,
        }
    }

    /// Deploy one candidate.
    pub async fn deploy(&self, candidate: &CandidateOptimization) -> DeployResult {
        let area = candidate.target_area.as_str();
        if !self.locks.try_acquire(area) {
            debug!("Area {} is locked, deferring {}", area, candidate.id);
            return DeployResult::Deferred;
        }

        let started = Instant::now();
        let backup = match timeout(self.deploy_timeout, self.adapter.backup(area)).await {
            Ok(Ok(backup)) => backup,
            Ok(Err(e)) if e.is_unavailable() => {
                self.locks.release(area);
                return DeployResult::Unavailable(e.to_string());
            }
            Ok(Err(e)) => return self.fail(candidate, None, format!("backup failed: {}", e)).await,
            Err(_) => {
                return self
                    .fail(candidate, None, format!("backup timed out after {:?}", self.deploy_timeout))
                    .await
            }
        };

        let remaining = self.deploy_timeout.saturating_sub(started.elapsed());
        let change = async {
            self.adapter.apply(area, &candidate.change).await?;
            self.adapter.verify(area).await?;
            Ok::<(), AdapterError>(())
        };
        match timeout(remaining, change).await {
            Ok(Ok(())) => {
                info!("Deployed {} to {} (backup {})", candidate.id, area, backup);
                DeployResult::Deployed(DeploymentRecord::active(candidate.id, area, backup))
            }
            Ok(Err(e)) => self.fail(candidate, Some(backup), e.to_string()).await,
            Err(_) => {
                self.fail(
                    candidate,
                    Some(backup),
                    format!("deploy timed out after {:?}", self.deploy_timeout),
                )
                .await
            }
        }
    }

    async fn fail(&self, candidate: &CandidateOptimization, backup: Option<BackupRef>, reason: String) -> DeployResult {
        let area = candidate.target_area.as_str();
        warn!("Deploy of {} to {} failed: {}", candidate.id, area, reason);

        let mut restore_failed = false;
        let mut reason = reason;
        if let Some(backup) = &backup {
            match timeout(self.deploy_timeout, self.adapter.restore(backup)).await {
                Ok(Ok(())) => debug!("Restored {} from {}", area, backup),
                Ok(Err(e)) => {
                    error!("Restore of {} from {} failed: {}", area, backup, e);
                    reason = format!("{}; restore failed: {}", reason, e);
                    restore_failed = true;
                }
                Err(_) => {
                    error!("Restore of {} from {} timed out", area, backup);
                    reason = format!("{}; restore timed out", reason);
                    restore_failed = true;
                }
            }
        }

        self.locks.release(area);
        DeployResult::Failed {
            record: DeploymentRecord::failed(candidate.id, area, backup, reason),
            restore_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_target::InMemoryTarget;
    use serde_json::json;
    use venturi_core::DeploymentStatus;

    fn candidate(area: &str) -> CandidateOptimization {
        CandidateOptimization::new(
            area,
            "halve batches",
            0.9,
            3.0,
            6.0,
            json!({"parameter": "max_batch_size", "action": "scale", "factor": 0.5}),
        )
    }

    #[tokio::test]
    async fn test_successful_deploy_holds_lock() {
        let target = InMemoryTarget::new().with_area("ingest", json!({"max_batch_size": 100}));
        let locks = AreaLocks::new();
        let deployer = Deployer::new(&target, &locks, Duration::from_secs(30));

        let DeployResult::Deployed(record) = deployer.deploy(&candidate("ingest")).await else {
            panic!("expected deploy");
        };
        assert_eq!(record.status, DeploymentStatus::Active);
        assert!(locks.is_locked("ingest"));
        assert_eq!(target.area_json("ingest").unwrap()["max_batch_size"], json!(50));
    }

    #[tokio::test]
    async fn test_failed_apply_restores_exact_bytes() {
        let target = InMemoryTarget::new().with_area("ingest", json!({"max_batch_size": 100, "note": "keep"}));
        let before = target.area_bytes("ingest").unwrap();
        target.fail_apply("ingest", true);
        target.corrupt_on_failure(true);
        let locks = AreaLocks::new();
        let deployer = Deployer::new(&target, &locks, Duration::from_secs(30));

        let DeployResult::Failed { record, restore_failed } = deployer.deploy(&candidate("ingest")).await else {
            panic!("expected failure");
        };
        assert!(!restore_failed);
        assert_eq!(record.status, DeploymentStatus::Failed);
        assert!(record.backup_ref.is_some());
        assert_eq!(target.area_bytes("ingest").unwrap(), before);
        assert!(!locks.is_locked("ingest"));
    }

    #[tokio::test]
    async fn test_failed_verify_restores() {
        let target = InMemoryTarget::new().with_area("ingest", json!({"max_batch_size": 100}));
        let before = target.area_bytes("ingest").unwrap();
        target.fail_verify("ingest", true);
        let locks = AreaLocks::new();
        let deployer = Deployer::new(&target, &locks, Duration::from_secs(30));

        assert!(matches!(deployer.deploy(&candidate("ingest")).await, DeployResult::Failed { .. }));
        assert_eq!(target.area_bytes("ingest").unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_restores() {
        let target = InMemoryTarget::new().with_area("ingest", json!({"max_batch_size": 100}));
        let before = target.area_bytes("ingest").unwrap();
        target.set_apply_delay(Some(Duration::from_secs(60)));
        let locks = AreaLocks::new();
        let deployer = Deployer::new(&target, &locks, Duration::from_secs(30));

        let DeployResult::Failed { record, .. } = deployer.deploy(&candidate("ingest")).await else {
            panic!("expected timeout");
        };
        assert!(record.reason.unwrap().contains("timed out"));
        assert_eq!(target.area_bytes("ingest").unwrap(), before);
        assert_eq!(target.restore_count(), 1);
    }

    #[tokio::test]
    async fn test_locked_area_defers() {
        let target = InMemoryTarget::new().with_area("ingest", json!({"max_batch_size": 100}));
        let locks = AreaLocks::new();
        locks.try_acquire("ingest");
        let deployer = Deployer::new(&target, &locks, Duration::from_secs(30));
        assert!(matches!(deployer.deploy(&candidate("ingest")).await, DeployResult::Deferred));
        assert_eq!(target.backup_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_before_backup_releases_lock() {
        let target = InMemoryTarget::new();
        target.set_unavailable(true);
        let locks = AreaLocks::new();
        let deployer = Deployer::new(&target, &locks, Duration::from_secs(30));
        assert!(matches!(deployer.deploy(&candidate("ingest")).await, DeployResult::Unavailable(_)));
        assert!(!locks.is_locked("ingest"));
    }
}
