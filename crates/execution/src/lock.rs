//! Per-area deployment locks.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of areas with an in-flight change. Cloning shares the set.
#[derive(Debug, Clone, Default)]
pub struct AreaLocks {
    held: Arc<Mutex<BTreeSet<String>>>,
}

impl AreaLocks {
    /// Empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for an area. False if it is already held.
    pub fn try_acquire(&self, area: &str) -> bool {
        self.lock().insert(area.to_string())
    }

    /// Release an area. Releasing an unheld area is a no-op.
    pub fn release(&self, area: &str) {
        self.lock().remove(area);
    }

    /// Whether an area is held.
    pub fn is_locked(&self, area: &str) -> bool {
        self.lock().contains(area)
    }

    /// Held areas in name order.
    pub fn held(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_holder_per_area() {
        let locks = AreaLocks::new();
        let shared = locks.clone();
        assert!(locks.try_acquire("ingest"));
        assert!(!shared.try_acquire("ingest"));
        assert!(shared.try_acquire("egress"));

        locks.release("ingest");
        assert!(shared.try_acquire("ingest"));
        assert_eq!(locks.held(), vec!["egress".to_string(), "ingest".to_string()]);
    }
}
