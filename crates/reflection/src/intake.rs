//! Intake filtering: raw telemetry → experiences.

use crate::ReflectionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use venturi_core::{
    snapshot_traits, CognitiveTrait, Experience, ExperienceId, LearnerConfig, Metric, Observation,
};

/// Largest accepted distance of an observation timestamp into the future.
const MAX_CLOCK_SKEW_SECONDS: i64 = 300;

/// Ambient conditions the telemetry was collected under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentContext {
    /// Latency the system is expected to meet, in milliseconds
    pub target_latency_ms: f64,

    /// Expected throughput, if the platform reports one
    #[serde(default)]
    pub target_throughput: Option<f64>,

    /// Free-form labels (deployment, region, ...)
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl EnvironmentContext {
    /// Context with the given latency target.
    pub fn new(target_latency_ms: f64) -> Self {
        Self {
            target_latency_ms,
            target_throughput: None,
            tags: BTreeMap::new(),
        }
    }

    /// Set the throughput target.
    pub fn with_target_throughput(mut self, target: f64) -> Self {
        self.target_throughput = Some(target);
        self
    }

    /// Check the context is usable for scoring.
    pub fn validate(&self) -> Result<(), ReflectionError> {
        if !(self.target_latency_ms.is_finite() && self.target_latency_ms > 0.0) {
            return Err(ReflectionError::InvalidContext(format!(
                "target_latency_ms must be finite and positive, got {}",
                self.target_latency_ms
            )));
        }
        if let Some(t) = self.target_throughput {
            if !(t.is_finite() && t > 0.0) {
                return Err(ReflectionError::InvalidContext(format!(
                    "target_throughput must be finite and positive, got {}",
                    t
                )));
            }
        }
        Ok(())
    }
}

impl Default for EnvironmentContext {
    fn default() -> Self {
        Self::new(50.0)
    }
}

/// Result of filtering one batch.
#[derive(Debug, Clone, Default)]
pub struct IntakeBatch {
    /// Experiences ready to commit, in input order
    pub experiences: Vec<Experience>,
    /// Observations dropped as malformed or unusable
    pub discarded: usize,
}

/// Turns observations into scored experiences.
pub struct IntakeFilter<'a> {
    config: &'a LearnerConfig,
    context: &'a EnvironmentContext,
}

impl<'a> IntakeFilter<'a> {
    /// Create a filter. Fails if the context cannot score anything.
    pub fn new(config: &'a LearnerConfig, context: &'a EnvironmentContext) -> Result<Self, ReflectionError> {
        context.validate()?;
        Ok(Self { config, context })
    }

    /// Build experiences for a whole batch without touching any buffer.
    pub fn filter(&self, raw: &[Observation], traits: &[CognitiveTrait]) -> IntakeBatch {
        let snapshot = snapshot_traits(traits);
        let horizon = chrono::Utc::now() + chrono::Duration::seconds(MAX_CLOCK_SKEW_SECONDS);
        let mut batch = IntakeBatch::default();

        for obs in raw {
            if !obs.is_well_formed() || obs.timestamp > horizon {
                debug!("Discarding malformed {} observation: {}", obs.metric, obs.value);
                batch.discarded += 1;
                continue;
            }
            let Some((quality, failure)) = self.score(obs) else {
                debug!("Discarding unknown metric {}", obs.metric);
                batch.discarded += 1;
                continue;
            };
            batch.experiences.push(Experience {
                id: ExperienceId::new(),
                recorded_at: obs.timestamp,
                area: obs.area().to_string(),
                metric: obs.metric.clone(),
                value: obs.value,
                quality,
                failure,
                traits: snapshot.clone(),
            });
        }
        batch
    }

    /// Quality in `[0, 1]` and failure flag, or None for unknown metrics.
    fn score(&self, obs: &Observation) -> Option<(f64, bool)> {
        let target = self.context.target_latency_ms;
        match &obs.metric {
            Metric::LatencyMs => {
                let quality = if obs.value <= target { 1.0 } else { target / obs.value };
                Some((quality, obs.value > target * self.config.spike_factor))
            }
            Metric::ErrorCount => Some((1.0 / (1.0 + obs.value), obs.value > 0.0)),
            Metric::Throughput => {
                let expected = self.context.target_throughput?;
                let quality = (obs.value / expected).min(1.0);
                Some((quality, quality < 0.5))
            }
            Metric::Custom(_) => None,
        }
    }
}
