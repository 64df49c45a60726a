//! Target-system adapter seam.
//!
//! Every deploy goes `backup → apply → verify`; a failure at any step is
//! answered with `restore(backup)`. Monitoring polls `health_check`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use venturi_core::BackupRef;

/// Adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The target system cannot be reached
    #[error("target unavailable: {0}")]
    Unavailable(String),

    /// The change could not be applied
    #[error("change rejected: {0}")]
    Rejected(String),

    /// The applied change failed verification
    #[error("verification failed: {0}")]
    VerifyFailed(String),

    /// Restore was asked for a backup the adapter never took
    #[error("unknown backup: {0}")]
    UnknownBackup(String),

    /// Stored target state could not be read
    #[error("malformed target state: {0}")]
    Malformed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Whether the target could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AdapterError::Unavailable(_))
    }
}

/// Post-deploy health of an area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Improvement attributable to the change, `[0, 1]`
    #[serde(default)]
    pub effectiveness: Option<f64>,

    /// Share of failing operations since the change
    #[serde(default)]
    pub error_rate: Option<f64>,

    /// Samples the figures are based on
    #[serde(default)]
    pub samples: u64,
}

impl HealthMetrics {
    /// Metrics backed by `samples` observations.
    pub fn new(effectiveness: f64, error_rate: f64, samples: u64) -> Self {
        Self {
            effectiveness: Some(effectiveness),
            error_rate: Some(error_rate),
            samples,
        }
    }

    /// Whether both figures are present, finite and sufficiently sampled.
    pub fn is_conclusive(&self, min_samples: u64) -> bool {
        let finite = |v: Option<f64>| v.is_some_and(f64::is_finite);
        finite(self.effectiveness) && finite(self.error_rate) && self.samples >= min_samples
    }
}

/// Operations the pipeline needs from the system being optimized.
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    /// Adapter name for logs.
    fn name(&self) -> &str;

    /// Capture the current state of an area.
    async fn backup(&self, area: &str) -> Result<BackupRef, AdapterError>;

    /// Apply a change payload to an area.
    async fn apply(&self, area: &str, change: &Value) -> Result<(), AdapterError>;

    /// Check the area is consistent after apply.
    async fn verify(&self, area: &str) -> Result<(), AdapterError>;

    /// Put an area back exactly as it was when the backup was taken.
    async fn restore(&self, backup: &BackupRef) -> Result<(), AdapterError>;

    /// Current health of an area.
    async fn health_check(&self, area: &str) -> Result<HealthMetrics, AdapterError>;
}

/// Apply a change payload to an area document.
///
/// Supported payloads:
/// - `{"parameter": p, "action": "scale", "factor": f}` multiplies a numeric
///   field, keeping integers integral;
/// - `{"parameter": p, "action": "set", "value": v}` replaces a field;
///   without `value`, the remaining payload fields become the new value.
pub fn apply_change(document: &mut Value, change: &Value) -> Result<(), AdapterError> {
    let fields = change
        .as_object()
        .ok_or_else(|| AdapterError::Rejected("change must be an object".into()))?;
    let parameter = fields
        .get("parameter")
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::Rejected("change has no parameter".into()))?;
    let action = fields.get("action").and_then(Value::as_str).unwrap_or("set");
    let target = document
        .as_object_mut()
        .ok_or_else(|| AdapterError::Malformed("area document is not an object".into()))?;

    match action {
        "scale" => {
            let factor = fields
                .get("factor")
                .and_then(Value::as_f64)
                .filter(|f| f.is_finite() && *f > 0.0)
                .ok_or_else(|| AdapterError::Rejected("scale needs a positive factor".into()))?;
            let current = target.get(parameter).ok_or_else(|| {
                AdapterError::Rejected(format!("parameter '{}' does not exist", parameter))
            })?;
            let scaled = if let Some(n) = current.as_i64() {
                if n <= 0 {
                    return Err(AdapterError::Rejected(format!(
                        "parameter '{}' is {}, only positive integers can be scaled",
                        parameter, n
                    )));
                }
                Value::from(((n as f64) * factor).round().max(1.0) as i64)
            } else if let Some(x) = current.as_f64() {
                Value::from(x * factor)
            } else {
                return Err(AdapterError::Rejected(format!(
                    "parameter '{}' is not numeric",
                    parameter
                )));
            };
            target.insert(parameter.to_string(), scaled);
        }
        "set" => {
            let value = match fields.get("value") {
                Some(v) => v.clone(),
                None => Value::Object(
                    fields
                        .iter()
                        .filter(|(k, _)| *k != "parameter" && *k != "action")
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<Map<String, Value>>(),
                ),
            };
            target.insert(parameter.to_string(), value);
        }
        other => return Err(AdapterError::Rejected(format!("unknown action '{}'", other))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scale_keeps_integers_integral() {
        let mut doc = json!({"max_batch_size": 100, "ratio": 1.5});
        apply_change(&mut doc, &json!({"parameter": "max_batch_size", "action": "scale", "factor": 0.8})).unwrap();
        apply_change(&mut doc, &json!({"parameter": "ratio", "action": "scale", "factor": 2.0})).unwrap();
        assert_eq!(doc, json!({"max_batch_size": 80, "ratio": 3.0}));
    }

    #[test]
    fn test_scale_rejects_non_positive_integers() {
        let change = json!({"parameter": "max_batch_size", "action": "scale", "factor": 0.8});
        for value in [0, -5] {
            let mut doc = json!({"max_batch_size": value});
            let err = apply_change(&mut doc, &change).unwrap_err();
            assert!(matches!(err, AdapterError::Rejected(_)));
            assert_eq!(doc, json!({"max_batch_size": value}));
        }

        let mut doc = json!({"max_batch_size": 1});
        apply_change(&mut doc, &change).unwrap();
        assert_eq!(doc, json!({"max_batch_size": 1}));
    }

    #[test]
    fn test_set_without_value_uses_remaining_fields() {
        let mut doc = json!({});
        let change = json!({"parameter": "retry_policy", "action": "set", "max_retries": 3, "backoff_ms": 150.0});
        apply_change(&mut doc, &change).unwrap();
        assert_eq!(doc["retry_policy"], json!({"max_retries": 3, "backoff_ms": 150.0}));
    }

    #[test]
    fn test_rejects_bad_payloads() {
        let mut doc = json!({"flag": "on"});
        for change in [
            json!("nope"),
            json!({"action": "set"}),
            json!({"parameter": "missing", "action": "scale", "factor": 0.5}),
            json!({"parameter": "flag", "action": "scale", "factor": 0.5}),
            json!({"parameter": "flag", "action": "explode"}),
        ] {
            assert!(matches!(apply_change(&mut doc, &change), Err(AdapterError::Rejected(_))));
        }
        assert_eq!(doc, json!({"flag": "on"}));
    }

    #[test]
    fn test_health_conclusiveness() {
        assert!(!HealthMetrics::default().is_conclusive(1));
        assert!(HealthMetrics::new(0.8, 0.01, 5).is_conclusive(1));
        assert!(!HealthMetrics::new(f64::NAN, 0.01, 5).is_conclusive(1));
        assert!(!HealthMetrics::new(0.8, 0.01, 0).is_conclusive(1));
    }
}
