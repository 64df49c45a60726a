//! In-memory storage implementation.
//!
//! Used by tests and by hosts that delegate durability elsewhere.

use std::collections::BTreeMap;
use super::{Bucket, Result, Storage};
use tokio::sync::Mutex;

/// Volatile storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<(Bucket, String), Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values in a bucket.
    pub async fn count(&self, bucket: Bucket) -> usize {
        self.entries.lock().await.keys().filter(|(b, _)| *b == bucket).count()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, bucket: Bucket, key: &str, value: &[u8]) -> Result<()> {
        self.entries.lock().await.insert((bucket, key.to_string()), value.to_vec());
        Ok(())
    }

    async fn load(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(&(bucket, key.to_string())).cloned())
    }

    async fn list(&self, bucket: Bucket) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|((b, _), _)| *b == bucket)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<()> {
        self.entries.lock().await.remove(&(bucket, key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageExt;
    use std::sync::Arc;
    use venturi_core::{AuditEvent, AuditKind};

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let storage = MemoryStorage::new();
        storage.save(Bucket::Audit, "k", b"1").await.unwrap();
        storage.save(Bucket::Learner, "k", b"2").await.unwrap();

        assert_eq!(storage.count(Bucket::Audit).await, 1);
        assert_eq!(storage.load(Bucket::Learner, "k").await.unwrap().unwrap(), b"2");
        storage.delete(Bucket::Audit, "k").await.unwrap();
        assert_eq!(storage.count(Bucket::Audit).await, 0);
        assert_eq!(storage.count(Bucket::Learner).await, 1);
    }

    #[tokio::test]
    async fn test_typed_helpers_through_dyn_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let event = AuditEvent::new(AuditKind::Deployed, "ingest", "deployed candidate");
        storage.save_audit_event(&event).await.unwrap();

        let events = storage.list_audit_events().await.unwrap();
        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn test_list_json_skips_garbage() {
        let storage = MemoryStorage::new();
        storage.save(Bucket::Audit, "bad", b"not json").await.unwrap();
        let event = AuditEvent::new(AuditKind::Kept, "x", "kept");
        storage.save_audit_event(&event).await.unwrap();

        let events = storage.list_audit_events().await.unwrap();
        assert_eq!(events.len(), 1);
    }
}
