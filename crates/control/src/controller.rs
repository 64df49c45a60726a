//! Latency-driven batch aggressiveness controller.
//!
//! ```text
//! latency → EWMA → ratio = smoothed / target
//!   ratio > slow_ratio  → aggressiveness × decrease_factor (floored)
//!   ratio < fast_ratio  → aggressiveness × increase_factor (capped)
//!   otherwise           → unchanged (dead-band)
//! ```
//!
//! The step factors are asymmetric: undoing one decrease takes several
//! increases (see [`recovery_steps`]), so a single fast sample after a slow
//! run never restores the previous aggressiveness.

use crate::{ControlError, SignalSmoother};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use venturi_core::ControllerConfig;

/// Controller output after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Batch aggressiveness coefficient
    pub aggressiveness: f64,
    /// Largest batch currently allowed
    pub batch_size_bound: usize,
    /// Smoothed latency divided by target at the last tick
    pub last_latency_ratio: f64,
}

/// Direction of the last adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adjustment {
    /// Running slow, aggressiveness reduced
    Decreased,
    /// Ample headroom, aggressiveness raised
    Increased,
    /// Inside the dead-band
    Unchanged,
}

/// Adjusts batch aggressiveness from observed latency.
#[derive(Debug, Clone)]
pub struct AdaptiveBatchController {
    config: ControllerConfig,
    smoother: SignalSmoother,
    state: ControllerState,
    last_adjustment: Adjustment,
    ticks: u64,
}

impl AdaptiveBatchController {
    /// Create a controller at its initial aggressiveness.
    pub fn new(config: ControllerConfig) -> Self {
        let aggressiveness = config
            .initial_aggressiveness
            .clamp(config.min_aggressiveness, config.max_aggressiveness);
        let state = ControllerState {
            aggressiveness,
            batch_size_bound: batch_bound_for(&config, aggressiveness),
            last_latency_ratio: 1.0,
        };
        Self {
            smoother: SignalSmoother::new(config.smoothing_weight),
            config,
            state,
            last_adjustment: Adjustment::Unchanged,
            ticks: 0,
        }
    }

    /// Feed one latency observation and return the new state.
    ///
    /// Non-finite or negative latencies are rejected, logged and ignored.
    pub fn adjust(&mut self, latency_ms: f64) -> Result<ControllerState, ControlError> {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            warn!("Ignoring invalid latency observation: {}", latency_ms);
            return Err(ControlError::InvalidObservation { value: latency_ms });
        }

        let smoothed = self.smoother.update(latency_ms)?;
        let ratio = smoothed / self.config.target_latency_ms;
        let before = self.state.aggressiveness;

        let (aggressiveness, adjustment) = if ratio > self.config.slow_ratio {
            (
                (before * self.config.decrease_factor).max(self.config.min_aggressiveness),
                Adjustment::Decreased,
            )
        } else if ratio < self.config.fast_ratio {
            (
                (before * self.config.increase_factor).min(self.config.max_aggressiveness),
                Adjustment::Increased,
            )
        } else {
            (before, Adjustment::Unchanged)
        };

        self.state = ControllerState {
            aggressiveness,
            batch_size_bound: batch_bound_for(&self.config, aggressiveness),
            last_latency_ratio: ratio,
        };
        self.last_adjustment = adjustment;
        self.ticks += 1;

        debug!(
            latency_ms,
            smoothed,
            ratio,
            aggressiveness,
            batch_size_bound = self.state.batch_size_bound,
            "controller tick {:?}",
            adjustment
        );

        Ok(self.state)
    }

    /// Like [`adjust`](Self::adjust) but always returns the current state.
    pub fn observe(&mut self, latency_ms: f64) -> ControllerState {
        self.adjust(latency_ms).unwrap_or(self.state)
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Direction of the last accepted tick.
    pub fn last_adjustment(&self) -> Adjustment {
        self.last_adjustment
    }

    /// Current smoothed latency.
    pub fn smoothed_latency(&self) -> Option<f64> {
        self.smoother.value()
    }

    /// Number of accepted observations.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Configuration in use.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Explicitly return to the initial state. Never called automatically.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

/// Monotonic map from aggressiveness onto `[min_batch_size, max_batch_size]`.
pub fn batch_bound_for(config: &ControllerConfig, aggressiveness: f64) -> usize {
    let span = config.max_aggressiveness - config.min_aggressiveness;
    let fraction = if span > 0.0 {
        ((aggressiveness - config.min_aggressiveness) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let range = config.max_batch_size.saturating_sub(config.min_batch_size) as f64;
    let bound = config.min_batch_size + (fraction * range).round() as usize;
    bound.clamp(config.min_batch_size, config.max_batch_size)
}

/// Number of consecutive increases needed to undo one decrease.
pub fn recovery_steps(decrease_factor: f64, increase_factor: f64) -> u32 {
    if !(decrease_factor > 0.0 && decrease_factor < 1.0 && increase_factor > 1.0) {
        return 0;
    }
    ((1.0 / decrease_factor).ln() / increase_factor.ln()).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Controller without smoothing so each sample maps directly to a ratio.
    fn raw_controller(target: f64, initial: f64) -> AdaptiveBatchController {
        AdaptiveBatchController::new(ControllerConfig {
            target_latency_ms: target,
            smoothing_weight: 1.0,
            initial_aggressiveness: initial,
            ..Default::default()
        })
    }

    /// Small deterministic generator so the bounds test needs no extra crates.
    fn lcg(seed: &mut u64) -> f64 {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (*seed >> 11) as f64 / (1u64 << 53) as f64
    }

    #[test]
    fn test_bounds_hold_for_arbitrary_sequences() {
        let config = ControllerConfig::default();
        let mut controller = AdaptiveBatchController::new(config.clone());
        let mut seed = 42u64;

        for i in 0..5_000 {
            let latency = match i % 97 {
                0 => f64::NAN,
                1 => -5.0,
                2 => f64::INFINITY,
                3 => 1e9,
                _ => lcg(&mut seed) * 200.0,
            };
            let state = controller.observe(latency);
            assert!(state.aggressiveness >= 1.1 && state.aggressiveness <= 2.5);
            assert!(state.batch_size_bound >= config.min_batch_size);
            assert!(state.batch_size_bound <= config.max_batch_size);
        }
    }

    #[test]
    fn test_dead_band_never_changes_aggressiveness() {
        for latency in [85.0, 90.0, 100.0, 104.9, 105.0] {
            let mut controller = raw_controller(100.0, 2.0);
            let state = controller.adjust(latency).unwrap();
            assert_eq!(state.aggressiveness, 2.0, "latency {} moved aggressiveness", latency);
            assert_eq!(controller.last_adjustment(), Adjustment::Unchanged);
        }
    }

    #[test]
    fn test_slow_and_fast_steps() {
        let mut controller = raw_controller(100.0, 2.0);
        let slow = controller.adjust(120.0).unwrap();
        assert!((slow.aggressiveness - 1.9).abs() < 1e-12);
        assert_eq!(controller.last_adjustment(), Adjustment::Decreased);

        let fast = controller.adjust(50.0).unwrap();
        assert!((fast.aggressiveness - 1.9 * 1.02).abs() < 1e-12);
        assert_eq!(controller.last_adjustment(), Adjustment::Increased);
    }

    #[test]
    fn test_recovery_needs_three_fast_steps_per_slow_step() {
        assert_eq!(recovery_steps(0.95, 1.02), 3);

        let mut controller = raw_controller(100.0, 2.0);
        let before = controller.state().aggressiveness;
        controller.adjust(200.0).unwrap();

        let one = controller.adjust(10.0).unwrap();
        assert!(one.aggressiveness < before);
        let two = controller.adjust(10.0).unwrap();
        assert!(two.aggressiveness < before);
        let three = controller.adjust(10.0).unwrap();
        assert!(three.aggressiveness >= before);
    }

    #[test]
    fn test_single_fast_sample_after_slow_run_does_not_recover() {
        let mut controller = AdaptiveBatchController::new(ControllerConfig::default());
        let prior = controller.state().aggressiveness;
        for latency in [70.0, 75.0, 72.0, 68.0, 80.0, 85.0] {
            controller.adjust(latency).unwrap();
        }
        let after_slow = controller.state().aggressiveness;
        assert!(after_slow < prior);

        let after_one_fast = controller.adjust(20.0).unwrap().aggressiveness;
        assert!(after_one_fast <= after_slow);
        assert!(after_one_fast < prior);
    }

    #[test]
    fn test_slow_then_repeated_fast_recovers() {
        let mut controller = AdaptiveBatchController::new(ControllerConfig::default());
        for latency in [70.0, 75.0, 72.0, 68.0, 80.0, 85.0] {
            controller.adjust(latency).unwrap();
        }
        let after_slow = controller.state().aggressiveness;

        for _ in 0..15 {
            for latency in [20.0, 25.0, 30.0, 22.0] {
                controller.adjust(latency).unwrap();
            }
        }
        assert!(controller.state().aggressiveness > after_slow);
    }

    #[test]
    fn test_invalid_latency_leaves_state_untouched() {
        let mut controller = raw_controller(100.0, 2.0);
        controller.adjust(120.0).unwrap();
        let state = controller.state();

        assert!(controller.adjust(f64::NAN).is_err());
        assert!(controller.adjust(-1.0).is_err());
        assert_eq!(controller.state(), state);
        assert_eq!(controller.ticks(), 1);
        assert_eq!(controller.smoothed_latency(), Some(120.0));
    }

    #[test]
    fn test_batch_bound_is_monotonic() {
        let config = ControllerConfig::default();
        let mut previous = 0;
        let mut a = config.min_aggressiveness;
        while a <= config.max_aggressiveness {
            let bound = batch_bound_for(&config, a);
            assert!(bound >= previous);
            previous = bound;
            a += 0.01;
        }
        assert_eq!(batch_bound_for(&config, config.min_aggressiveness), config.min_batch_size);
        assert_eq!(batch_bound_for(&config, config.max_aggressiveness), config.max_batch_size);
    }

    #[test]
    fn test_reset_is_explicit() {
        let mut controller = raw_controller(100.0, 2.0);
        controller.adjust(300.0).unwrap();
        controller.reset();
        assert_eq!(controller.state().aggressiveness, 2.0);
        assert_eq!(controller.ticks(), 0);
        assert!(controller.smoothed_latency().is_none());
    }
}
