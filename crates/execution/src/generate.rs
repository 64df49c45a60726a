//! Generate phase: opportunities → candidate optimizations.

use async_trait::async_trait;
use venturi_core::{
    CandidateOptimization, Opportunity, OpportunityKind, PipelineConfig, RollbackPlan, RollbackTrigger,
    TestCase,
};

/// Synthesis errors. The opportunity goes to manual review.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The opportunity cannot be turned into a change
    #[error("malformed opportunity: {0}")]
    Malformed(String),

    /// The change payload is not something the adapter understands
    #[error("unsupported change: {0}")]
    Unsupported(String),
}

/// Turns an opportunity into a concrete, immutable candidate.
#[async_trait]
pub trait CandidateSynthesizer: Send + Sync {
    /// Synthesize one candidate.
    async fn synthesize(&self, opportunity: &Opportunity) -> Result<CandidateOptimization, SynthesisError>;
}

/// Synthesizer for the built-in opportunity kinds.
///
/// Scores carry over unchanged; every candidate gets a backup-based rollback
/// plan and test cases derived from the monitor thresholds.
#[derive(Debug, Clone)]
pub struct DefaultSynthesizer {
    effectiveness_threshold: f64,
    error_rate_threshold: f64,
}

impl DefaultSynthesizer {
    /// Synthesizer using the pipeline's monitor thresholds.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            effectiveness_threshold: config.effectiveness_threshold,
            error_rate_threshold: config.error_rate_threshold,
        }
    }

    fn check_change(opportunity: &Opportunity) -> Result<(), SynthesisError> {
        let change = opportunity
            .change
            .as_object()
            .ok_or_else(|| SynthesisError::Unsupported("change payload is not an object".into()))?;
        if !change.get("parameter").is_some_and(|p| p.is_string()) {
            return Err(SynthesisError::Unsupported("change names no parameter".into()));
        }
        match change.get("action").and_then(|a| a.as_str()) {
            Some("scale") | Some("set") | None => Ok(()),
            Some(other) => Err(SynthesisError::Unsupported(format!("action '{}'", other))),
        }
    }

    fn test_cases(&self, opportunity: &Opportunity) -> Vec<TestCase> {
        let mut cases = vec![
            TestCase {
                name: "effectiveness".into(),
                description: format!("measured effectiveness in '{}'", opportunity.area),
                expectation: format!("at least {}", self.effectiveness_threshold),
            },
            TestCase {
                name: "error_rate".into(),
                description: format!("error rate in '{}' after deploy", opportunity.area),
                expectation: format!("at most {}", self.error_rate_threshold),
            },
        ];
        let specific = match opportunity.kind {
            OpportunityKind::ReduceBatchAggressiveness => TestCase {
                name: "latency_recovers".into(),
                description: "smoothed latency after the batch bound shrinks".into(),
                expectation: "at or below target".into(),
            },
            OpportunityKind::IncreaseBatchAggressiveness => TestCase {
                name: "latency_holds".into(),
                description: "smoothed latency after the batch bound grows".into(),
                expectation: "stays below target".into(),
            },
            OpportunityKind::EnableRetryBackoff => TestCase {
                name: "errors_recover".into(),
                description: "recurring errors after retries back off".into(),
                expectation: "fewer failing samples than before".into(),
            },
        };
        cases.push(specific);
        cases
    }
}

#[async_trait]
impl CandidateSynthesizer for DefaultSynthesizer {
    async fn synthesize(&self, opportunity: &Opportunity) -> Result<CandidateOptimization, SynthesisError> {
        if opportunity.area.trim().is_empty() {
            return Err(SynthesisError::Malformed("empty target area".into()));
        }
        if !opportunity.has_finite_scores() {
            return Err(SynthesisError::Malformed("non-finite scores".into()));
        }
        Self::check_change(opportunity)?;

        let plan = RollbackPlan {
            backup_required: true,
            steps: vec![
                format!("restore pre-deploy backup of '{}'", opportunity.area),
                format!("verify '{}' matches the backup", opportunity.area),
            ],
            triggers: vec![
                RollbackTrigger::DeployFailure,
                RollbackTrigger::DeployTimeout,
                RollbackTrigger::LowEffectiveness,
                RollbackTrigger::HighErrorRate,
                RollbackTrigger::InconclusiveMonitoring,
            ],
        };

        Ok(CandidateOptimization::new(
            opportunity.area.clone(),
            opportunity.description.clone(),
            opportunity.confidence,
            opportunity.risk_score,
            opportunity.complexity_score,
            opportunity.change.clone(),
        )
        .with_rollback_plan(plan)
        .with_test_cases(self.test_cases(opportunity)))
    }
}
