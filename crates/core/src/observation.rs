//! Observation model - raw runtime telemetry.

use crate::Time;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag naming the target area an observation belongs to.
pub const AREA_TAG: &str = "area";

/// Area used when an observation carries no `area` tag.
pub const DEFAULT_AREA: &str = "default";

/// What an observation measures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Request or batch latency in milliseconds
    LatencyMs,
    /// Number of errors observed since the previous sample
    ErrorCount,
    /// Items processed per second
    Throughput,
    /// Any other platform-defined metric
    Custom(String),
}

impl Metric {
    /// Stable name used in logs and tags.
    pub fn as_str(&self) -> &str {
        match self {
            Metric::LatencyMs => "latency_ms",
            Metric::ErrorCount => "error_count",
            Metric::Throughput => "throughput",
            Metric::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single telemetry sample pushed in by the surrounding runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// What was measured
    pub metric: Metric,

    /// Measured value
    pub value: f64,

    /// When it was measured
    pub timestamp: Time,

    /// Optional free-form tags (`area` is interpreted by the learner)
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Observation {
    /// Create a new observation stamped with the current time.
    pub fn new(metric: Metric, value: f64) -> Self {
        Self {
            metric,
            value,
            timestamp: chrono::Utc::now(),
            tags: BTreeMap::new(),
        }
    }

    /// Latency observation in milliseconds.
    pub fn latency(ms: f64) -> Self {
        Self::new(Metric::LatencyMs, ms)
    }

    /// Error-count observation.
    pub fn errors(count: f64) -> Self {
        Self::new(Metric::ErrorCount, count)
    }

    /// Attach the target area this observation belongs to.
    pub fn in_area(self, area: impl Into<String>) -> Self {
        self.with_tag(AREA_TAG, area)
    }

    /// Attach an arbitrary tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: Time) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Target area, falling back to [`DEFAULT_AREA`].
    pub fn area(&self) -> &str {
        self.tags.get(AREA_TAG).map(String::as_str).unwrap_or(DEFAULT_AREA)
    }

    /// Whether the value is usable at all (finite and non-negative).
    pub fn is_well_formed(&self) -> bool {
        self.value.is_finite() && self.value >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_defaults_when_untagged() {
        let obs = Observation::latency(12.0);
        assert_eq!(obs.area(), DEFAULT_AREA);

        let tagged = Observation::latency(12.0).in_area("ingest");
        assert_eq!(tagged.area(), "ingest");
    }

    #[test]
    fn test_well_formed_rejects_nan_and_negative() {
        assert!(Observation::latency(0.0).is_well_formed());
        assert!(!Observation::latency(f64::NAN).is_well_formed());
        assert!(!Observation::latency(f64::INFINITY).is_well_formed());
        assert!(!Observation::latency(-1.0).is_well_formed());
    }

    #[test]
    fn test_metric_serializes_snake_case() {
        let json = serde_json::to_string(&Metric::LatencyMs).unwrap();
        assert_eq!(json, "\"latency_ms\"");
        let custom: Metric = serde_json::from_str(r#"{"custom":"queue_depth"}"#).unwrap();
        assert_eq!(custom.as_str(), "queue_depth");
    }
}
