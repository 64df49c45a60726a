//! Candidate-model generation: insights → scored opportunities.

use serde_json::json;
use std::collections::BTreeMap;
use venturi_core::{CognitiveTrait, Feature, Insight, LearnerConfig, Opportunity, OpportunityKind};

/// Confidence lost per recent regression in the area.
const REGRESSION_CONFIDENCE_PENALTY: f64 = 0.25;
/// Confidence gained per recent success in the area.
const SUCCESS_CONFIDENCE_BONUS: f64 = 0.05;
/// Risk added per recent regression in the area.
const REGRESSION_RISK_PENALTY: f64 = 1.5;

#[derive(Debug, Default, Clone, Copy)]
struct AreaHistory {
    regressions: usize,
    successes: usize,
}

/// Scores opportunities from insights and the current traits.
pub struct OpportunityBuilder<'a> {
    config: &'a LearnerConfig,
    focus: f64,
    resilience: f64,
    adaptability: f64,
}

impl<'a> OpportunityBuilder<'a> {
    /// Capture the trait values used for scoring.
    pub fn new(config: &'a LearnerConfig, traits: &[CognitiveTrait]) -> Self {
        let get = |name: &str| {
            traits
                .iter()
                .find(|t| t.name == name)
                .map(|t| t.current)
                .unwrap_or(0.5)
        };
        Self {
            config,
            focus: get(CognitiveTrait::FOCUS),
            resilience: get(CognitiveTrait::RESILIENCE),
            adaptability: get(CognitiveTrait::ADAPTABILITY),
        }
    }

    /// One opportunity per actionable insight, in insight order.
    pub fn build(&self, insights: &[Insight]) -> Vec<Opportunity> {
        let mut history: BTreeMap<&str, AreaHistory> = BTreeMap::new();
        for insight in insights {
            let entry = history.entry(insight.area.as_str()).or_default();
            match insight.feature {
                Feature::DeploymentRegression => entry.regressions += insight.frequency,
                Feature::DeploymentSuccess => entry.successes += insight.frequency,
                _ => {}
            }
        }

        insights
            .iter()
            .filter_map(|insight| {
                let area = history.get(insight.area.as_str()).copied().unwrap_or_default();
                self.opportunity(insight, area)
            })
            .collect()
    }

    fn opportunity(&self, insight: &Insight, history: AreaHistory) -> Option<Opportunity> {
        let strength = insight.strength;
        let (kind, description, severity, base_risk, base_complexity, change) = match insight.feature {
            Feature::LatencySpike => {
                let factor = (1.0 - 0.2 * strength).max(0.7);
                (
                    OpportunityKind::ReduceBatchAggressiveness,
                    format!(
                        "Latency above target in {:.0}% of '{}' samples; shrink batches by {:.0}%",
                        strength * 100.0,
                        insight.area,
                        (1.0 - factor) * 100.0
                    ),
                    1.0 - insight.mean_quality,
                    2.0,
                    3.0,
                    json!({"parameter": "max_batch_size", "action": "scale", "factor": factor}),
                )
            }
            Feature::Headroom => {
                let factor = 1.0 + 0.1 * strength;
                (
                    OpportunityKind::IncreaseBatchAggressiveness,
                    format!(
                        "Latency well below target in {:.0}% of '{}' samples; grow batches by {:.0}%",
                        strength * 100.0,
                        insight.area,
                        (factor - 1.0) * 100.0
                    ),
                    0.5,
                    3.0,
                    3.0,
                    json!({"parameter": "max_batch_size", "action": "scale", "factor": factor}),
                )
            }
            Feature::RecurringFailure => (
                OpportunityKind::EnableRetryBackoff,
                format!(
                    "Errors in {:.0}% of '{}' samples; enable retry back-off",
                    strength * 100.0,
                    insight.area
                ),
                1.0 - insight.mean_quality,
                3.5,
                5.0,
                json!({
                    "parameter": "retry_policy",
                    "action": "set",
                    "max_retries": 3,
                    "backoff_ms": (100.0 * (1.0 + strength)).round(),
                }),
            ),
            Feature::DeploymentRegression | Feature::DeploymentSuccess => return None,
        };

        let support = (insight.frequency as f64 / (2 * self.config.min_occurrences.max(1)) as f64).min(1.0);
        let confidence = 0.45 * strength + 0.35 * support + 0.2 * self.focus
            + 0.1 * (self.adaptability - 0.5)
            - REGRESSION_CONFIDENCE_PENALTY * history.regressions as f64
            + SUCCESS_CONFIDENCE_BONUS * history.successes as f64;
        let risk = base_risk
            + 3.0 * (1.0 - self.resilience)
            + REGRESSION_RISK_PENALTY * history.regressions as f64;
        let complexity = base_complexity + 2.0 * (1.0 - self.focus);

        Some(Opportunity {
            area: insight.area.clone(),
            kind,
            description,
            expected_impact: (strength * severity).clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            risk_score: risk.clamp(0.0, 10.0),
            complexity_score: complexity.clamp(0.0, 10.0),
            change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venturi_core::default_traits;

    fn insight(feature: Feature, frequency: usize, strength: f64, mean_quality: f64) -> Insight {
        Insight {
            feature,
            area: "ingest".into(),
            frequency,
            strength,
            mean_quality,
        }
    }

    #[test]
    fn test_strong_spike_scores_above_gate() {
        let config = LearnerConfig::default();
        let traits = default_traits();
        let opps = OpportunityBuilder::new(&config, &traits)
            .build(&[insight(Feature::LatencySpike, 20, 1.0, 0.25)]);

        assert_eq!(opps.len(), 1);
        let o = &opps[0];
        assert_eq!(o.kind, OpportunityKind::ReduceBatchAggressiveness);
        assert!(o.confidence > 0.85, "confidence {}", o.confidence);
        assert!(o.risk_score < 5.0);
        assert!(o.complexity_score < 8.0);
        assert_eq!(o.expected_impact, 0.75);
        assert!((o.change["factor"].as_f64().unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_weak_insight_scores_low() {
        let config = LearnerConfig::default();
        let traits = default_traits();
        let opps = OpportunityBuilder::new(&config, &traits)
            .build(&[insight(Feature::LatencySpike, 3, 0.2, 0.6)]);
        assert!(opps[0].confidence < 0.85);
    }

    #[test]
    fn test_regression_lowers_confidence_and_raises_risk() {
        let config = LearnerConfig::default();
        let traits = default_traits();
        let builder = OpportunityBuilder::new(&config, &traits);
        let spike = insight(Feature::LatencySpike, 20, 1.0, 0.25);

        let clean = builder.build(&[spike.clone()]);
        let regressed = builder.build(&[spike, insight(Feature::DeploymentRegression, 1, 1.0, 0.1)]);

        assert_eq!(regressed.len(), 1);
        assert!(regressed[0].confidence < clean[0].confidence);
        assert!(regressed[0].risk_score > clean[0].risk_score);
    }

    #[test]
    fn test_outcome_insights_produce_no_opportunity() {
        let config = LearnerConfig::default();
        let traits = default_traits();
        let opps = OpportunityBuilder::new(&config, &traits)
            .build(&[insight(Feature::DeploymentSuccess, 2, 1.0, 0.9)]);
        assert!(opps.is_empty());
    }

    #[test]
    fn test_failure_maps_to_retry_backoff() {
        let config = LearnerConfig::default();
        let traits = default_traits();
        let opps = OpportunityBuilder::new(&config, &traits)
            .build(&[insight(Feature::RecurringFailure, 6, 0.5, 0.3)]);
        assert_eq!(opps[0].kind, OpportunityKind::EnableRetryBackoff);
        assert_eq!(opps[0].change["max_retries"], json!(3));
        assert!(opps[0].has_finite_scores());
    }
}
