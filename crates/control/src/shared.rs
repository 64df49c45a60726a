//! Cloneable controller handle for concurrent observation producers.

use crate::{AdaptiveBatchController, ControlError, ControllerState};
use std::sync::{Arc, Mutex, MutexGuard};
use venturi_core::ControllerConfig;

/// Single-writer wrapper around [`AdaptiveBatchController`].
///
/// Every producer holds a clone; mutation is serialized by a mutex held only
/// for the duration of one tick, with no I/O under the lock.
#[derive(Debug, Clone)]
pub struct SharedController {
    inner: Arc<Mutex<AdaptiveBatchController>>,
}

impl SharedController {
    /// Wrap a new controller.
    pub fn new(config: ControllerConfig) -> Self {
        Self::from_controller(AdaptiveBatchController::new(config))
    }

    /// Wrap an existing controller.
    pub fn from_controller(controller: AdaptiveBatchController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Feed one latency observation.
    pub fn adjust(&self, latency_ms: f64) -> Result<ControllerState, ControlError> {
        self.lock().adjust(latency_ms)
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.lock().state()
    }

    /// Explicit reset.
    pub fn reset(&self) {
        self.lock().reset();
    }

    // State is replaced in one assignment per tick, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, AdaptiveBatchController> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrent_producers_respect_bounds() {
        let shared = SharedController::new(ControllerConfig::default());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let handle = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let latency = if (i + worker) % 3 == 0 { 120.0 } else { 10.0 };
                        let _ = handle.adjust(latency);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let state = shared.state();
        assert!(state.aggressiveness >= 1.1 && state.aggressiveness <= 2.5);
        assert_eq!(shared.lock().ticks(), 8 * 500);
    }

    #[test]
    fn test_clones_share_state() {
        let a = SharedController::new(ControllerConfig {
            smoothing_weight: 1.0,
            ..Default::default()
        });
        let b = a.clone();
        a.adjust(500.0).unwrap();
        assert_eq!(a.state(), b.state());
        b.reset();
        assert_eq!(a.state().aggressiveness, 1.5);
    }
}
