//! Storage trait abstraction.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use venturi_core::{AuditEvent, CandidateOptimization, DeploymentRecord, ManualReviewItem};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key is not usable as a storage key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Logical namespaces the optimizer persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    /// Deployment records (audit history)
    Deployments,
    /// Archived candidates (accepted or rejected)
    Candidates,
    /// Generation failures awaiting an operator
    ManualReview,
    /// Audit events
    Audit,
    /// Learner snapshots
    Learner,
}

impl Bucket {
    /// All buckets.
    pub const ALL: [Bucket; 5] = [
        Bucket::Deployments,
        Bucket::Candidates,
        Bucket::ManualReview,
        Bucket::Audit,
        Bucket::Learner,
    ];

    /// Directory / namespace name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Deployments => "deployments",
            Bucket::Candidates => "candidates",
            Bucket::ManualReview => "manual_review",
            Bucket::Audit => "audit",
            Bucket::Learner => "learner",
        }
    }
}

/// Key-value storage for optimizer history.
///
/// Backends use interior mutability so one instance can be shared between
/// the pipeline and the runtime through an `Arc`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save a value (create or overwrite).
    async fn save(&self, bucket: Bucket, key: &str, value: &[u8]) -> Result<()>;

    /// Load a value by key.
    async fn load(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>>;

    /// List all values in a bucket, ordered by key.
    async fn list(&self, bucket: Bucket) -> Result<Vec<(String, Vec<u8>)>>;

    /// Delete a value. Missing keys are not an error.
    async fn delete(&self, bucket: Bucket, key: &str) -> Result<()>;
}

/// Typed JSON helpers on top of [`Storage`].
#[async_trait]
pub trait StorageExt: Storage {
    /// Serialize and save a value.
    async fn save_json<T: Serialize + Sync>(&self, bucket: Bucket, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.save(bucket, key, &bytes).await
    }

    /// Load and deserialize a value.
    async fn load_json<T: DeserializeOwned + Send>(&self, bucket: Bucket, key: &str) -> Result<Option<T>> {
        match self.load(bucket, key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load every value in a bucket, skipping entries that fail to parse.
    async fn list_json<T: DeserializeOwned + Send>(&self, bucket: Bucket) -> Result<Vec<T>> {
        let entries = self.list(bucket).await?;
        let mut items = Vec::with_capacity(entries.len());
        for (key, bytes) in entries {
            match serde_json::from_slice(&bytes) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!("Skipping unreadable {}/{}: {}", bucket.as_str(), key, e),
            }
        }
        Ok(items)
    }

    // === Domain helpers ===

    /// Save a deployment record keyed by its id.
    async fn save_deployment(&self, record: &DeploymentRecord) -> Result<()> {
        self.save_json(Bucket::Deployments, &record.id.to_string(), record).await
    }

    /// All deployment records, oldest first.
    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>> {
        let mut records: Vec<DeploymentRecord> = self.list_json(Bucket::Deployments).await?;
        records.sort_by(|a, b| a.deployed_at.cmp(&b.deployed_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Archive a candidate keyed by its id.
    async fn save_candidate(&self, candidate: &CandidateOptimization) -> Result<()> {
        self.save_json(Bucket::Candidates, &candidate.id.to_string(), candidate).await
    }

    /// File a manual-review item.
    async fn save_manual_review(&self, item: &ManualReviewItem) -> Result<()> {
        self.save_json(Bucket::ManualReview, &item.id.to_string(), item).await
    }

    /// All manual-review items, oldest first.
    async fn list_manual_review(&self) -> Result<Vec<ManualReviewItem>> {
        let mut items: Vec<ManualReviewItem> = self.list_json(Bucket::ManualReview).await?;
        items.sort_by(|a, b| a.filed_at.cmp(&b.filed_at));
        Ok(items)
    }

    /// Append an audit event.
    async fn save_audit_event(&self, event: &AuditEvent) -> Result<()> {
        self.save_json(Bucket::Audit, &event.id.to_string(), event).await
    }

    /// All audit events, oldest first.
    async fn list_audit_events(&self) -> Result<Vec<AuditEvent>> {
        let mut events: Vec<AuditEvent> = self.list_json(Bucket::Audit).await?;
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(events)
    }

    /// Delete the oldest audit events so at most `keep` remain.
    /// Returns how many were deleted.
    async fn prune_audit_events(&self, keep: usize) -> Result<usize> {
        let events = self.list_audit_events().await?;
        let excess = events.len().saturating_sub(keep);
        for event in &events[..excess] {
            self.delete(Bucket::Audit, &event.id.to_string()).await?;
        }
        Ok(excess)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// Replace characters that are unsafe in file names.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Validate a key for backends that map keys to file names.
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('.') || key != sanitize_key(key) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
