//! Detect phase: candidate models → opportunities.

use std::collections::HashSet;
use tracing::debug;
use venturi_core::{CandidateModel, Opportunity, OpportunityKind};

/// Why a detect pass could not produce opportunities.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// A model carried an opportunity with non-finite scores
    #[error("model from cycle {cycle} is malformed: {reason}")]
    MalformedModel {
        /// Learner cycle of the model
        cycle: u64,
        /// What was wrong
        reason: String,
    },
}

/// Collect opportunities, deferred ones first, keeping one per
/// `(area, kind)`.
///
/// A fresh opportunity replaces a deferred one for the same key, since it
/// was scored against the latest history. Any malformed model fails the
/// whole pass.
pub fn detect(models: &[CandidateModel], deferred: &[Opportunity]) -> Result<Vec<Opportunity>, DetectError> {
    for model in models {
        if let Some(bad) = model.opportunities.iter().find(|o| !o.has_finite_scores()) {
            return Err(DetectError::MalformedModel {
                cycle: model.cycle,
                reason: format!("non-finite scores for {} in '{}'", bad.kind, bad.area),
            });
        }
    }

    let fresh: Vec<&Opportunity> = models
        .iter()
        .filter(|m| m.skipped.is_none())
        .flat_map(|m| m.opportunities.iter())
        .collect();
    let fresh_keys: HashSet<(&str, OpportunityKind)> =
        fresh.iter().map(|o| (o.area.as_str(), o.kind)).collect();

    let mut seen: HashSet<(String, OpportunityKind)> = HashSet::new();
    let mut found = Vec::new();
    for opportunity in deferred {
        if fresh_keys.contains(&(opportunity.area.as_str(), opportunity.kind)) {
            debug!("Fresh {} for '{}' replaces deferred one", opportunity.kind, opportunity.area);
            continue;
        }
        if seen.insert((opportunity.area.clone(), opportunity.kind)) {
            found.push(opportunity.clone());
        }
    }
    for opportunity in fresh {
        if seen.insert((opportunity.area.clone(), opportunity.kind)) {
            found.push(opportunity.clone());
        } else {
            debug!("Dropping duplicate {} for '{}'", opportunity.kind, opportunity.area);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use venturi_core::default_traits;

    fn opportunity(area: &str, kind: OpportunityKind, confidence: f64) -> Opportunity {
        Opportunity {
            area: area.into(),
            kind,
            description: "d".into(),
            expected_impact: 0.5,
            confidence,
            risk_score: 1.0,
            complexity_score: 1.0,
            change: serde_json::Value::Null,
        }
    }

    fn model(opportunities: Vec<Opportunity>) -> CandidateModel {
        let mut m = CandidateModel::empty(1, default_traits());
        m.opportunities = opportunities;
        m
    }

    #[test]
    fn test_deferred_first_and_deduplicated() {
        let deferred = vec![
            opportunity("c", OpportunityKind::EnableRetryBackoff, 0.7),
            opportunity("c", OpportunityKind::EnableRetryBackoff, 0.6),
        ];
        let models = vec![model(vec![
            opportunity("b", OpportunityKind::ReduceBatchAggressiveness, 0.9),
            opportunity("b", OpportunityKind::ReduceBatchAggressiveness, 0.8),
        ])];
        let found = detect(&models, &deferred).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].area, "c");
        assert_eq!(found[0].confidence, 0.7);
        assert_eq!(found[1].area, "b");
        assert_eq!(found[1].confidence, 0.9);
    }

    #[test]
    fn test_fresh_opportunity_replaces_stale_deferred_one() {
        let deferred = vec![opportunity("a", OpportunityKind::EnableRetryBackoff, 0.95)];
        let models = vec![model(vec![
            opportunity("a", OpportunityKind::EnableRetryBackoff, 0.6),
            opportunity("b", OpportunityKind::ReduceBatchAggressiveness, 0.9),
        ])];
        let found = detect(&models, &deferred).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].area, "a");
        assert_eq!(found[0].confidence, 0.6);
        assert_eq!(found[1].area, "b");
    }

    #[test]
    fn test_malformed_model_fails_pass() {
        let models = vec![model(vec![opportunity("a", OpportunityKind::EnableRetryBackoff, f64::NAN)])];
        assert!(matches!(detect(&models, &[]), Err(DetectError::MalformedModel { cycle: 1, .. })));
    }

    #[test]
    fn test_skipped_models_contribute_nothing() {
        let mut skipped = model(vec![opportunity("a", OpportunityKind::EnableRetryBackoff, 0.9)]);
        skipped.skipped = Some("bad context".into());
        assert!(detect(&[skipped], &[]).unwrap().is_empty());
    }
}
