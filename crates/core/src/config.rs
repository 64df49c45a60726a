//! Configuration surface.
//!
//! Every field has a default, so a partial JSON document is a valid
//! configuration. Call [`VenturiConfig::validate`] after loading.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors found while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Document could not be parsed
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of its allowed range
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Fast-path controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Latency the controller steers toward
    pub target_latency_ms: f64,
    /// EWMA weight of the newest sample, `(0, 1]`
    pub smoothing_weight: f64,
    /// Aggressiveness floor
    pub min_aggressiveness: f64,
    /// Aggressiveness ceiling
    pub max_aggressiveness: f64,
    /// Aggressiveness at start-up
    pub initial_aggressiveness: f64,
    /// Ratio above which the system counts as slow
    pub slow_ratio: f64,
    /// Ratio below which the system counts as fast
    pub fast_ratio: f64,
    /// Multiplier applied when slow
    pub decrease_factor: f64,
    /// Multiplier applied when fast
    pub increase_factor: f64,
    /// Smallest batch-size bound
    pub min_batch_size: usize,
    /// Largest batch-size bound
    pub max_batch_size: usize,
}

/// Smoothing weight equivalent to an N-sample averaging window.
pub fn smoothing_weight_for_window(samples: usize) -> f64 {
    2.0 / (samples.max(1) as f64 + 1.0)
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_latency_ms: 50.0,
            smoothing_weight: smoothing_weight_for_window(10),
            min_aggressiveness: 1.1,
            max_aggressiveness: 2.5,
            initial_aggressiveness: 1.5,
            slow_ratio: 1.05,
            fast_ratio: 0.85,
            decrease_factor: 0.95,
            increase_factor: 1.02,
            min_batch_size: 1,
            max_batch_size: 256,
        }
    }
}

/// Slow-path learner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Experience ring-buffer capacity
    pub ring_buffer_capacity: usize,
    /// How many recent experiences reflection scans
    pub reflection_window: usize,
    /// Occurrences needed before a feature becomes an insight
    pub min_occurrences: usize,
    /// Experiences needed before traits evolve
    pub min_experiences: usize,
    /// Largest per-cycle trait change
    pub max_trait_step: f64,
    /// Latency above `target * spike_factor` counts as a spike
    pub spike_factor: f64,
    /// Latency below `target * headroom_factor` counts as headroom
    pub headroom_factor: f64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            ring_buffer_capacity: 1000,
            reflection_window: 200,
            min_occurrences: 3,
            min_experiences: 10,
            max_trait_step: 0.05,
            spike_factor: 1.5,
            headroom_factor: 0.5,
        }
    }
}

/// Optimization pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Candidates need confidence strictly above this
    pub confidence_threshold: f64,
    /// Candidates need risk strictly below this
    pub risk_threshold: f64,
    /// Candidates need complexity strictly below this
    pub complexity_threshold: f64,
    /// Monitor observation window
    pub monitor_window_seconds: u64,
    /// Interval between health checks inside the window
    pub monitor_poll_interval_seconds: u64,
    /// Health samples needed for a conclusive window
    pub min_monitor_samples: u64,
    /// Roll back below this effectiveness
    pub effectiveness_threshold: f64,
    /// Roll back above this error rate
    pub error_rate_threshold: f64,
    /// Opportunities synthesized per cycle
    pub top_k_candidates_per_cycle: usize,
    /// Upper bound on backup + apply + verify
    pub deploy_timeout_seconds: u64,
    /// Default interval between cycles
    pub cycle_interval_seconds: u64,
    /// Back-off ceiling for the cycle interval
    pub max_cycle_interval_seconds: u64,
    /// Consecutive adapter failures before the operator is alerted
    pub adapter_failure_alert_threshold: u32,
    /// Weight of expected impact in ranking
    pub impact_weight: f64,
    /// Weight of confidence in ranking
    pub confidence_weight: f64,
    /// Persisted audit events kept; older ones are pruned after each run
    pub audit_retention: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            risk_threshold: 5.0,
            complexity_threshold: 8.0,
            monitor_window_seconds: 300,
            monitor_poll_interval_seconds: 30,
            min_monitor_samples: 1,
            effectiveness_threshold: 0.5,
            error_rate_threshold: 0.05,
            top_k_candidates_per_cycle: 5,
            deploy_timeout_seconds: 30,
            cycle_interval_seconds: 60,
            max_cycle_interval_seconds: 3600,
            adapter_failure_alert_threshold: 3,
            impact_weight: 0.6,
            confidence_weight: 0.4,
            audit_retention: 10_000,
        }
    }
}

impl PipelineConfig {
    /// Monitor window as a duration.
    pub fn monitor_window(&self) -> Duration {
        Duration::from_secs(self.monitor_window_seconds)
    }

    /// Poll interval as a duration (at least one second).
    pub fn monitor_poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_poll_interval_seconds.max(1))
    }

    /// Deploy timeout as a duration.
    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_seconds)
    }

    /// Default cycle interval as a duration.
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_seconds)
    }

    /// Back-off ceiling as a duration.
    pub fn max_cycle_interval(&self) -> Duration {
        Duration::from_secs(self.max_cycle_interval_seconds.max(self.cycle_interval_seconds))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenturiConfig {
    /// Fast-path controller
    pub controller: ControllerConfig,
    /// Slow-path learner
    pub learner: LearnerConfig,
    /// Optimization pipeline
    pub pipeline: PipelineConfig,
    /// Bounded telemetry queue between fast and slow path
    pub telemetry_queue_capacity: usize,
}

impl Default for VenturiConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            learner: LearnerConfig::default(),
            pipeline: PipelineConfig::default(),
            telemetry_queue_capacity: 4096,
        }
    }
}

impl VenturiConfig {
    /// Parse from a JSON document and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.controller;
        positive("controller.target_latency_ms", c.target_latency_ms)?;
        if !(c.smoothing_weight > 0.0 && c.smoothing_weight <= 1.0) {
            return invalid("controller.smoothing_weight", "must be within (0, 1]");
        }
        positive("controller.min_aggressiveness", c.min_aggressiveness)?;
        if !(c.max_aggressiveness >= c.min_aggressiveness) {
            return invalid("controller.max_aggressiveness", "must not be below min_aggressiveness");
        }
        if !(c.initial_aggressiveness >= c.min_aggressiveness
            && c.initial_aggressiveness <= c.max_aggressiveness)
        {
            return invalid("controller.initial_aggressiveness", "must lie within [min, max]");
        }
        if !(c.fast_ratio > 0.0 && c.fast_ratio <= c.slow_ratio) {
            return invalid("controller.fast_ratio", "must be positive and not above slow_ratio");
        }
        if !(c.decrease_factor > 0.0 && c.decrease_factor < 1.0) {
            return invalid("controller.decrease_factor", "must be within (0, 1)");
        }
        if !(c.increase_factor > 1.0 && c.increase_factor.is_finite()) {
            return invalid("controller.increase_factor", "must be greater than 1");
        }
        if c.min_batch_size == 0 || c.max_batch_size < c.min_batch_size {
            return invalid("controller.max_batch_size", "batch bounds must satisfy 1 <= min <= max");
        }

        let l = &self.learner;
        if l.ring_buffer_capacity == 0 {
            return invalid("learner.ring_buffer_capacity", "must be at least 1");
        }
        if l.reflection_window == 0 {
            return invalid("learner.reflection_window", "must be at least 1");
        }
        if !(l.max_trait_step > 0.0 && l.max_trait_step <= 1.0) {
            return invalid("learner.max_trait_step", "must be within (0, 1]");
        }
        if !(l.headroom_factor > 0.0 && l.headroom_factor < l.spike_factor) {
            return invalid("learner.headroom_factor", "must be positive and below spike_factor");
        }

        let p = &self.pipeline;
        if !(0.0..=1.0).contains(&p.confidence_threshold) {
            return invalid("pipeline.confidence_threshold", "must be within [0, 1]");
        }
        if !(0.0..=10.0).contains(&p.risk_threshold) {
            return invalid("pipeline.risk_threshold", "must be within [0, 10]");
        }
        if !(0.0..=10.0).contains(&p.complexity_threshold) {
            return invalid("pipeline.complexity_threshold", "must be within [0, 10]");
        }
        if p.monitor_window_seconds == 0 {
            return invalid("pipeline.monitor_window_seconds", "must be at least 1");
        }
        if !(0.0..=1.0).contains(&p.error_rate_threshold) {
            return invalid("pipeline.error_rate_threshold", "must be within [0, 1]");
        }
        if !p.effectiveness_threshold.is_finite() {
            return invalid("pipeline.effectiveness_threshold", "must be finite");
        }
        if p.top_k_candidates_per_cycle == 0 {
            return invalid("pipeline.top_k_candidates_per_cycle", "must be at least 1");
        }
        if !(p.impact_weight >= 0.0 && p.confidence_weight >= 0.0) {
            return invalid("pipeline.impact_weight", "ranking weights must be non-negative");
        }

        if p.audit_retention == 0 {
            return invalid("pipeline.audit_retention", "must be at least 1");
        }

        if self.telemetry_queue_capacity == 0 {
            return invalid("telemetry_queue_capacity", "must be at least 1");
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        invalid(field, "must be a positive finite number")
    }
}

fn invalid(field: &'static str, reason: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    })
}
