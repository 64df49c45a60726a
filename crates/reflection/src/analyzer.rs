//! Pattern reflection over the recent experience window.

use std::collections::BTreeMap;
use venturi_core::{Experience, Feature, Insight, LearnerConfig, Metric};

/// Metric name of experiences produced from deployment outcomes.
pub const OUTCOME_METRIC: &str = "deployment_outcome";

/// Deployment outcomes are rare, so one is enough to count.
const MIN_OUTCOME_OCCURRENCES: usize = 1;

#[derive(Debug, Default)]
struct AreaStats {
    latency: usize,
    spikes: Vec<f64>,
    headroom: Vec<f64>,
    errors: usize,
    failures: Vec<f64>,
    regressions: Vec<f64>,
    successes: Vec<f64>,
}

/// Finds recurring features per area.
pub struct Analyzer<'a> {
    config: &'a LearnerConfig,
    target_latency_ms: f64,
}

impl<'a> Analyzer<'a> {
    /// Create an analyzer for a latency target.
    pub fn new(config: &'a LearnerConfig, target_latency_ms: f64) -> Self {
        Self {
            config,
            target_latency_ms,
        }
    }

    /// Emit insights for every feature that reaches its occurrence count.
    ///
    /// Output is ordered by area, then feature.
    pub fn analyze(&self, window: &[&Experience]) -> Vec<Insight> {
        let mut areas: BTreeMap<&str, AreaStats> = BTreeMap::new();
        let headroom_limit = self.target_latency_ms * self.config.headroom_factor;

        for exp in window {
            let stats = areas.entry(exp.area.as_str()).or_default();
            match &exp.metric {
                Metric::LatencyMs => {
                    stats.latency += 1;
                    if exp.failure {
                        stats.spikes.push(exp.quality);
                    } else if exp.value < headroom_limit {
                        stats.headroom.push(exp.quality);
                    }
                }
                Metric::ErrorCount => {
                    stats.errors += 1;
                    if exp.failure {
                        stats.failures.push(exp.quality);
                    }
                }
                Metric::Custom(name) if name == OUTCOME_METRIC => {
                    if exp.failure {
                        stats.regressions.push(exp.quality);
                    } else {
                        stats.successes.push(exp.quality);
                    }
                }
                _ => {}
            }
        }

        let min = self.config.min_occurrences.max(1);
        let mut insights = Vec::new();
        for (area, stats) in areas {
            let spike = insight(Feature::LatencySpike, area, &stats.spikes, stats.latency, min);
            // Headroom only counts when nothing in the area is running hot
            let headroom = if spike.is_none() {
                insight(Feature::Headroom, area, &stats.headroom, stats.latency, min)
            } else {
                None
            };
            let outcomes = stats.regressions.len() + stats.successes.len();
            insights.extend(
                [
                    spike,
                    insight(Feature::RecurringFailure, area, &stats.failures, stats.errors, min),
                    headroom,
                    insight(
                        Feature::DeploymentRegression,
                        area,
                        &stats.regressions,
                        outcomes,
                        MIN_OUTCOME_OCCURRENCES,
                    ),
                    insight(
                        Feature::DeploymentSuccess,
                        area,
                        &stats.successes,
                        outcomes,
                        MIN_OUTCOME_OCCURRENCES,
                    ),
                ]
                .into_iter()
                .flatten(),
            );
        }
        insights.sort_by(|a, b| a.area.cmp(&b.area).then(a.feature.cmp(&b.feature)));
        insights
    }
}

fn insight(feature: Feature, area: &str, qualities: &[f64], total: usize, min: usize) -> Option<Insight> {
    if qualities.len() < min || total == 0 {
        return None;
    }
    Some(Insight {
        feature,
        area: area.to_string(),
        frequency: qualities.len(),
        strength: qualities.len() as f64 / total as f64,
        mean_quality: qualities.iter().sum::<f64>() / qualities.len() as f64,
    })
}
