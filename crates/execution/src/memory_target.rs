//! In-memory target system with fault injection.

use crate::adapter::{apply_change, AdapterError, HealthMetrics, TargetAdapter};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use venturi_core::BackupRef;

#[derive(Debug, Default)]
struct Inner {
    areas: BTreeMap<String, Vec<u8>>,
    backups: HashMap<String, (String, Option<Vec<u8>>)>,
    health: HashMap<String, VecDeque<HealthMetrics>>,
    fail_apply: HashSet<String>,
    fail_verify: HashSet<String>,
    corrupt_on_failure: bool,
    unavailable: bool,
    apply_delay: Option<Duration>,
    restores: usize,
}

/// Target whose areas are JSON documents held as raw bytes.
///
/// Restores are byte-exact. Health answers are scripted per area: queued
/// answers are served in order and the last one repeats.
#[derive(Debug, Default)]
pub struct InMemoryTarget {
    inner: Mutex<Inner>,
}

impl InMemoryTarget {
    /// Empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an area with a JSON document.
    pub fn with_area(self, area: &str, document: Value) -> Self {
        self.set_area(area, &document);
        self
    }

    /// Replace an area document.
    pub fn set_area(&self, area: &str, document: &Value) {
        let bytes = serde_json::to_vec(document).unwrap_or_default();
        self.lock().areas.insert(area.to_string(), bytes);
    }

    /// Raw bytes of an area.
    pub fn area_bytes(&self, area: &str) -> Option<Vec<u8>> {
        self.lock().areas.get(area).cloned()
    }

    /// Parsed document of an area.
    pub fn area_json(&self, area: &str) -> Option<Value> {
        self.area_bytes(area)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    /// Make `apply` fail for an area.
    pub fn fail_apply(&self, area: &str, fail: bool) {
        toggle(&mut self.lock().fail_apply, area, fail);
    }

    /// Make `verify` fail for an area.
    pub fn fail_verify(&self, area: &str, fail: bool) {
        toggle(&mut self.lock().fail_verify, area, fail);
    }

    /// Leave garbage behind when an injected apply failure fires.
    pub fn corrupt_on_failure(&self, corrupt: bool) {
        self.lock().corrupt_on_failure = corrupt;
    }

    /// Make every call fail with [`AdapterError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Delay every apply.
    pub fn set_apply_delay(&self, delay: Option<Duration>) {
        self.lock().apply_delay = delay;
    }

    /// Answer every health check for an area with `metrics`.
    pub fn set_health(&self, area: &str, metrics: HealthMetrics) {
        self.lock()
            .health
            .insert(area.to_string(), VecDeque::from([metrics]));
    }

    /// Queue one health answer for an area.
    pub fn push_health(&self, area: &str, metrics: HealthMetrics) {
        self.lock()
            .health
            .entry(area.to_string())
            .or_default()
            .push_back(metrics);
    }

    /// Number of successful restores.
    pub fn restore_count(&self) -> usize {
        self.lock().restores
    }

    /// Number of backups taken.
    pub fn backup_count(&self) -> usize {
        self.lock().backups.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn available(&self) -> Result<MutexGuard<'_, Inner>, AdapterError> {
        let inner = self.lock();
        if inner.unavailable {
            return Err(AdapterError::Unavailable("in-memory target switched off".into()));
        }
        Ok(inner)
    }
}

fn toggle(set: &mut HashSet<String>, area: &str, on: bool) {
    if on {
        set.insert(area.to_string());
    } else {
        set.remove(area);
    }
}

#[async_trait]
impl TargetAdapter for InMemoryTarget {
    fn name(&self) -> &str {
        "memory"
    }

    async fn backup(&self, area: &str) -> Result<BackupRef, AdapterError> {
        let mut inner = self.available()?;
        let backup = BackupRef::generate();
        let snapshot = inner.areas.get(area).cloned();
        inner
            .backups
            .insert(backup.as_str().to_string(), (area.to_string(), snapshot));
        Ok(backup)
    }

    async fn apply(&self, area: &str, change: &Value) -> Result<(), AdapterError> {
        let delay = self.available()?.apply_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.available()?;
        if inner.fail_apply.contains(area) {
            if inner.corrupt_on_failure {
                inner.areas.insert(area.to_string(), b"{\"partial\":".to_vec());
            }
            return Err(AdapterError::Rejected(format!("injected apply failure in '{}'", area)));
        }
        let mut document = match inner.areas.get(area) {
            Some(bytes) => serde_json::from_slice(bytes)
                .map_err(|e| AdapterError::Malformed(e.to_string()))?,
            None => Value::Object(Default::default()),
        };
        apply_change(&mut document, change)?;
        let bytes = serde_json::to_vec(&document).map_err(|e| AdapterError::Malformed(e.to_string()))?;
        inner.areas.insert(area.to_string(), bytes);
        Ok(())
    }

    async fn verify(&self, area: &str) -> Result<(), AdapterError> {
        let inner = self.available()?;
        if inner.fail_verify.contains(area) {
            return Err(AdapterError::VerifyFailed(format!("injected verify failure in '{}'", area)));
        }
        match inner.areas.get(area) {
            Some(bytes) if serde_json::from_slice::<Value>(bytes).is_ok() => Ok(()),
            Some(_) => Err(AdapterError::VerifyFailed(format!("area '{}' is not valid JSON", area))),
            None => Err(AdapterError::VerifyFailed(format!("area '{}' is missing", area))),
        }
    }

    async fn restore(&self, backup: &BackupRef) -> Result<(), AdapterError> {
        let mut inner = self.available()?;
        let (area, snapshot) = inner
            .backups
            .get(backup.as_str())
            .cloned()
            .ok_or_else(|| AdapterError::UnknownBackup(backup.to_string()))?;
        match snapshot {
            Some(bytes) => inner.areas.insert(area, bytes),
            None => inner.areas.remove(&area),
        };
        inner.restores += 1;
        Ok(())
    }

    async fn health_check(&self, area: &str) -> Result<HealthMetrics, AdapterError> {
        let mut inner = self.available()?;
        let Some(queue) = inner.health.get_mut(area) else {
            return Ok(HealthMetrics::default());
        };
        let metrics = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(metrics.unwrap_or_default())
    }
}
