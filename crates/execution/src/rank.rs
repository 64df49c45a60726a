//! Rank phase: order opportunities by weighted priority.

use std::collections::BTreeMap;
use tracing::warn;
use venturi_core::{Opportunity, PipelineConfig};

/// Ranked opportunities.
#[derive(Debug, Clone)]
pub struct Ranking {
    /// Highest priority first
    pub ranked: Vec<Opportunity>,
    /// True when priorities could not be computed and input order was kept
    pub fell_back: bool,
}

/// `priority = impact_weight·impact + confidence_weight·confidence`,
/// scaled by the area priority from the last Iterate phase.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    impact_weight: f64,
    confidence_weight: f64,
}

impl Ranker {
    /// Ranker with the configured weights.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            impact_weight: config.impact_weight,
            confidence_weight: config.confidence_weight,
        }
    }

    /// Priority of one opportunity.
    pub fn priority(&self, opportunity: &Opportunity, area_weight: f64) -> f64 {
        (self.impact_weight * opportunity.expected_impact + self.confidence_weight * opportunity.confidence)
            * area_weight
    }

    /// Stable descending sort; input order if any priority is not finite.
    pub fn rank(&self, opportunities: Vec<Opportunity>, area_weights: &BTreeMap<String, f64>) -> Ranking {
        let scored: Vec<(f64, Opportunity)> = opportunities
            .into_iter()
            .map(|o| {
                let weight = area_weights.get(&o.area).copied().unwrap_or(1.0);
                (self.priority(&o, weight), o)
            })
            .collect();

        if let Some((p, o)) = scored.iter().find(|(p, _)| !p.is_finite()) {
            warn!("Priority for {} in '{}' is {}, keeping input order", o.kind, o.area, p);
            return Ranking {
                ranked: scored.into_iter().map(|(_, o)| o).collect(),
                fell_back: true,
            };
        }

        let mut scored = scored;
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ranking {
            ranked: scored.into_iter().map(|(_, o)| o).collect(),
            fell_back: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venturi_core::OpportunityKind;

    fn opportunity(area: &str, impact: f64, confidence: f64) -> Opportunity {
        Opportunity {
            area: area.into(),
            kind: OpportunityKind::ReduceBatchAggressiveness,
            description: "d".into(),
            expected_impact: impact,
            confidence,
            risk_score: 1.0,
            complexity_score: 1.0,
            change: serde_json::Value::Null,
        }
    }

    fn areas(ranking: &Ranking) -> Vec<&str> {
        ranking.ranked.iter().map(|o| o.area.as_str()).collect()
    }

    #[test]
    fn test_sorts_by_weighted_priority() {
        let ranker = Ranker::from_config(&PipelineConfig::default());
        let ranking = ranker.rank(
            vec![opportunity("low", 0.1, 0.5), opportunity("high", 0.9, 0.9), opportunity("mid", 0.5, 0.5)],
            &BTreeMap::new(),
        );
        assert!(!ranking.fell_back);
        assert_eq!(areas(&ranking), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let ranker = Ranker::from_config(&PipelineConfig::default());
        let ranking = ranker.rank(
            vec![opportunity("first", 0.5, 0.5), opportunity("second", 0.5, 0.5)],
            &BTreeMap::new(),
        );
        assert_eq!(areas(&ranking), vec!["first", "second"]);
    }

    #[test]
    fn test_non_finite_priority_falls_back() {
        let ranker = Ranker::from_config(&PipelineConfig::default());
        let ranking = ranker.rank(
            vec![opportunity("a", 0.1, 0.1), opportunity("b", f64::INFINITY, 0.9)],
            &BTreeMap::new(),
        );
        assert!(ranking.fell_back);
        assert_eq!(areas(&ranking), vec!["a", "b"]);
    }

    #[test]
    fn test_area_weight_demotes() {
        let ranker = Ranker::from_config(&PipelineConfig::default());
        let weights = BTreeMap::from([("hot".to_string(), 0.25)]);
        let ranking = ranker.rank(vec![opportunity("hot", 0.9, 0.9), opportunity("calm", 0.5, 0.5)], &weights);
        assert_eq!(areas(&ranking), vec!["calm", "hot"]);
    }
}
