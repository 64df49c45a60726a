//! Experience and cognitive-trait models.

use crate::id::ExperienceId;
use crate::observation::Metric;
use crate::Time;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trait values captured at the moment an experience was recorded.
pub type TraitSnapshot = BTreeMap<String, f64>;

/// A record of one processing episode.
///
/// Experiences are immutable once created; they leave the learner only by
/// FIFO eviction from its ring buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Unique identifier
    pub id: ExperienceId,

    /// When the underlying observation was made
    pub recorded_at: Time,

    /// Target area (input summary)
    pub area: String,

    /// What was measured
    pub metric: Metric,

    /// Raw measured value
    pub value: f64,

    /// Outcome quality in `[0, 1]`, higher is better
    pub quality: f64,

    /// Whether this episode counts as a failure
    pub failure: bool,

    /// Trait values at intake time
    pub traits: TraitSnapshot,
}

/// An adaptive trait such as focus, resilience or adaptability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveTrait {
    /// Trait name
    pub name: String,

    /// Value the trait was initialized with
    pub baseline: f64,

    /// Current value, always within `[0, 1]`
    pub current: f64,
}

impl CognitiveTrait {
    /// Focus: concentration on the dominant problem area.
    pub const FOCUS: &'static str = "focus";
    /// Resilience: tolerance for risk given recent failure rates.
    pub const RESILIENCE: &'static str = "resilience";
    /// Adaptability: willingness to change given recent deployment outcomes.
    pub const ADAPTABILITY: &'static str = "adaptability";

    /// Create a trait at its baseline.
    pub fn new(name: impl Into<String>, baseline: f64) -> Self {
        let baseline = clamp_unit(baseline);
        Self {
            name: name.into(),
            baseline,
            current: baseline,
        }
    }

    /// Move `current` toward `target` by at most `max_step`, clamped to `[0, 1]`.
    ///
    /// Returns the applied delta.
    pub fn nudge_toward(&mut self, target: f64, max_step: f64) -> f64 {
        if !target.is_finite() || !max_step.is_finite() {
            return 0.0;
        }
        let max_step = max_step.abs();
        let delta = (clamp_unit(target) - self.current).clamp(-max_step, max_step);
        let before = self.current;
        self.current = clamp_unit(self.current + delta);
        self.current - before
    }

    /// Return to the baseline value.
    pub fn reset(&mut self) {
        self.current = self.baseline;
    }
}

/// The default trait set: focus, resilience and adaptability at 0.5.
pub fn default_traits() -> Vec<CognitiveTrait> {
    vec![
        CognitiveTrait::new(CognitiveTrait::FOCUS, 0.5),
        CognitiveTrait::new(CognitiveTrait::RESILIENCE, 0.5),
        CognitiveTrait::new(CognitiveTrait::ADAPTABILITY, 0.5),
    ]
}

/// Snapshot a trait set into a name -> value map.
pub fn snapshot_traits(traits: &[CognitiveTrait]) -> TraitSnapshot {
    traits.iter().map(|t| (t.name.clone(), t.current)).collect()
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
