//! Trait evolution - nudges cognitive traits toward observed outcomes.

use crate::analyzer::OUTCOME_METRIC;
use serde::{Deserialize, Serialize};
use tracing::debug;
use venturi_core::{CognitiveTrait, Experience, Feature, Insight, LearnerConfig, Metric};

/// Proposed move of one trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitAdjustment {
    /// Trait name
    pub name: String,
    /// Value the trait is nudged toward
    pub target: f64,
    /// Delta actually applied (set by [`TraitEvolver::apply`])
    pub applied: f64,
    /// Reason for adjustment
    pub reason: String,
}

/// Computes trait targets from the reflection window.
pub struct TraitEvolver<'a> {
    config: &'a LearnerConfig,
}

impl<'a> TraitEvolver<'a> {
    /// Create an evolver.
    pub fn new(config: &'a LearnerConfig) -> Self {
        Self { config }
    }

    /// Suggest targets. Empty when the window is too small or nothing recurred.
    pub fn suggest(&self, window: &[&Experience], insights: &[Insight]) -> Vec<TraitAdjustment> {
        if window.len() < self.config.min_experiences || insights.is_empty() {
            debug!(
                "Trait evolution skipped: {} experiences, {} insights",
                window.len(),
                insights.len()
            );
            return Vec::new();
        }

        let mut adjustments = Vec::new();

        // Focus tracks how dominant the strongest problem is
        let dominant = insights
            .iter()
            .filter(|i| matches!(i.feature, Feature::LatencySpike | Feature::RecurringFailure))
            .map(|i| i.strength)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
        if let Some(strength) = dominant {
            adjustments.push(TraitAdjustment {
                name: CognitiveTrait::FOCUS.to_string(),
                target: strength,
                applied: 0.0,
                reason: format!("dominant problem strength {:.2}", strength),
            });
        }

        let failures = window.iter().filter(|e| e.failure).count();
        let failure_share = failures as f64 / window.len() as f64;
        adjustments.push(TraitAdjustment {
            name: CognitiveTrait::RESILIENCE.to_string(),
            target: 1.0 - failure_share,
            applied: 0.0,
            reason: format!("failure share {:.0}%", failure_share * 100.0),
        });

        let (succeeded, total) = window
            .iter()
            .filter(|e| matches!(&e.metric, Metric::Custom(name) if name == OUTCOME_METRIC))
            .fold((0usize, 0usize), |(ok, n), e| (ok + usize::from(!e.failure), n + 1));
        if total > 0 {
            let success_share = succeeded as f64 / total as f64;
            adjustments.push(TraitAdjustment {
                name: CognitiveTrait::ADAPTABILITY.to_string(),
                target: success_share,
                applied: 0.0,
                reason: format!("{} of {} deployments kept", succeeded, total),
            });
        }

        adjustments
    }

    /// Apply adjustments step-bounded, recording the applied delta.
    pub fn apply(&self, traits: &mut [CognitiveTrait], adjustments: &mut [TraitAdjustment]) {
        for adjustment in adjustments.iter_mut() {
            if let Some(t) = traits.iter_mut().find(|t| t.name == adjustment.name) {
                adjustment.applied = t.nudge_toward(adjustment.target, self.config.max_trait_step);
                debug!(
                    "Trait {} -> {:.3} ({:+.3}): {}",
                    t.name, t.current, adjustment.applied, adjustment.reason
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venturi_core::{default_traits, ExperienceId};

    fn exp(metric: Metric, failure: bool) -> Experience {
        Experience {
            id: ExperienceId::new(),
            recorded_at: chrono::Utc::now(),
            area: "a".into(),
            metric,
            value: 1.0,
            quality: if failure { 0.2 } else { 1.0 },
            failure,
            traits: Default::default(),
        }
    }

    fn spike(strength: f64) -> Insight {
        Insight {
            feature: Feature::LatencySpike,
            area: "a".into(),
            frequency: 5,
            strength,
            mean_quality: 0.3,
        }
    }

    fn value(traits: &[CognitiveTrait], name: &str) -> f64 {
        traits.iter().find(|t| t.name == name).map(|t| t.current).unwrap()
    }

    #[test]
    fn test_small_window_is_noop() {
        let config = LearnerConfig::default();
        let experiences: Vec<Experience> = (0..9).map(|_| exp(Metric::LatencyMs, true)).collect();
        let window: Vec<&Experience> = experiences.iter().collect();
        assert!(TraitEvolver::new(&config).suggest(&window, &[spike(1.0)]).is_empty());
    }

    #[test]
    fn test_no_insights_is_noop() {
        let config = LearnerConfig::default();
        let experiences: Vec<Experience> = (0..20).map(|_| exp(Metric::LatencyMs, false)).collect();
        let window: Vec<&Experience> = experiences.iter().collect();
        assert!(TraitEvolver::new(&config).suggest(&window, &[]).is_empty());
    }

    #[test]
    fn test_steps_are_bounded() {
        let config = LearnerConfig::default();
        let experiences: Vec<Experience> = (0..20).map(|_| exp(Metric::LatencyMs, true)).collect();
        let window: Vec<&Experience> = experiences.iter().collect();
        let evolver = TraitEvolver::new(&config);

        let mut traits = default_traits();
        let mut adjustments = evolver.suggest(&window, &[spike(1.0)]);
        evolver.apply(&mut traits, &mut adjustments);

        assert!((value(&traits, CognitiveTrait::FOCUS) - 0.55).abs() < 1e-12);
        assert!((value(&traits, CognitiveTrait::RESILIENCE) - 0.45).abs() < 1e-12);
        assert_eq!(value(&traits, CognitiveTrait::ADAPTABILITY), 0.5);
        assert!(adjustments.iter().all(|a| a.applied.abs() <= config.max_trait_step + 1e-12));
    }

    #[test]
    fn test_adaptability_follows_deployment_outcomes() {
        let config = LearnerConfig::default();
        let outcome = Metric::Custom(OUTCOME_METRIC.to_string());
        let mut experiences: Vec<Experience> = (0..10).map(|_| exp(Metric::LatencyMs, false)).collect();
        experiences.push(exp(outcome.clone(), false));
        experiences.push(exp(outcome, false));
        let window: Vec<&Experience> = experiences.iter().collect();

        let adjustments = TraitEvolver::new(&config).suggest(&window, &[spike(0.4)]);
        let adaptability = adjustments
            .iter()
            .find(|a| a.name == CognitiveTrait::ADAPTABILITY)
            .unwrap();
        assert_eq!(adaptability.target, 1.0);
    }
}
