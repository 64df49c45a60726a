//! Candidate models and optimizations.
//!
//! The learner emits a [`CandidateModel`] per cycle; the pipeline turns its
//! [`Opportunity`] entries into immutable [`CandidateOptimization`]s.

use crate::experience::CognitiveTrait;
use crate::id::{CandidateId, ReviewId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A recurring feature found by pattern reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Latency repeatedly well above target
    LatencySpike,
    /// Errors recurring in the same area
    RecurringFailure,
    /// Latency consistently well below target
    Headroom,
    /// Deployed changes in the area were rolled back or failed
    DeploymentRegression,
    /// Deployed changes in the area stayed active
    DeploymentSuccess,
}

impl Feature {
    /// Stable name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::LatencySpike => "latency_spike",
            Feature::RecurringFailure => "recurring_failure",
            Feature::Headroom => "headroom",
            Feature::DeploymentRegression => "deployment_regression",
            Feature::DeploymentSuccess => "deployment_success",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature observed in one area, with how often and how strongly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// What recurs
    pub feature: Feature,
    /// Where it recurs
    pub area: String,
    /// Number of supporting experiences
    pub frequency: usize,
    /// Share of the area's window that supports the feature, `[0, 1]`
    pub strength: f64,
    /// Mean quality of the supporting experiences
    pub mean_quality: f64,
}

/// Category of change an opportunity proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    /// Shrink batches to relieve backpressure
    ReduceBatchAggressiveness,
    /// Grow batches to use spare headroom
    IncreaseBatchAggressiveness,
    /// Add retry back-off to an error-prone area
    EnableRetryBackoff,
}

impl OpportunityKind {
    /// Stable name used in logs and generated descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityKind::ReduceBatchAggressiveness => "reduce_batch_aggressiveness",
            OpportunityKind::IncreaseBatchAggressiveness => "increase_batch_aggressiveness",
            OpportunityKind::EnableRetryBackoff => "enable_retry_backoff",
        }
    }
}

impl std::fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed improvement, scored but not yet synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Target area
    pub area: String,
    /// Kind of change
    pub kind: OpportunityKind,
    /// Human-readable description
    pub description: String,
    /// Expected improvement, `[0, 1]`
    pub expected_impact: f64,
    /// Confidence, `[0, 1]`
    pub confidence: f64,
    /// Risk, `[0, 10]`
    pub risk_score: f64,
    /// Complexity, `[0, 10]`
    pub complexity_score: f64,
    /// Change payload handed to the target adapter
    pub change: serde_json::Value,
}

impl Opportunity {
    /// Whether every score is a finite number.
    pub fn has_finite_scores(&self) -> bool {
        [self.expected_impact, self.confidence, self.risk_score, self.complexity_score]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Learner output for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateModel {
    /// Learner cycle that produced this model
    pub cycle: u64,
    /// When it was produced
    pub generated_at: Time,
    /// Trait values after evolution
    pub traits: Vec<CognitiveTrait>,
    /// Insights found by reflection
    pub insights: Vec<Insight>,
    /// Actionable opportunities (possibly empty)
    pub opportunities: Vec<Opportunity>,
    /// Why the cycle was skipped, if it was
    pub skipped: Option<String>,
}

impl CandidateModel {
    /// An empty model for a cycle that found nothing actionable.
    pub fn empty(cycle: u64, traits: Vec<CognitiveTrait>) -> Self {
        Self {
            cycle,
            generated_at: chrono::Utc::now(),
            traits,
            insights: Vec::new(),
            opportunities: Vec::new(),
            skipped: None,
        }
    }

    /// A model for a skipped cycle.
    pub fn skipped(cycle: u64, traits: Vec<CognitiveTrait>, reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Self::empty(cycle, traits)
        }
    }

    /// Whether there is nothing for the pipeline to do.
    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty()
    }
}

/// When a deployment should be reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackTrigger {
    /// Apply or verify failed
    DeployFailure,
    /// Deploy exceeded its timeout
    DeployTimeout,
    /// Measured effectiveness under threshold
    LowEffectiveness,
    /// Error rate above threshold
    HighErrorRate,
    /// Monitor window closed without conclusive data
    InconclusiveMonitoring,
}

/// How to undo a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackPlan {
    /// Whether a backup must be taken before apply
    pub backup_required: bool,
    /// Ordered restore steps (informational)
    pub steps: Vec<String>,
    /// Conditions that trigger the plan
    pub triggers: Vec<RollbackTrigger>,
}

/// A check the deployed change should satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Short name
    pub name: String,
    /// What is checked
    pub description: String,
    /// Expected outcome
    pub expectation: String,
}

/// A proposed change, not yet applied.
///
/// Immutable once created: the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOptimization {
    /// Unique identifier
    pub id: CandidateId,
    /// Target area
    pub target_area: String,
    /// Human-readable description
    pub description: String,
    /// Confidence, `[0, 1]`
    pub confidence: f64,
    /// Risk, `[0, 10]`
    pub risk_score: f64,
    /// Complexity, `[0, 10]`
    pub complexity_score: f64,
    /// Change payload
    pub change: serde_json::Value,
    /// How to undo it
    pub rollback_plan: RollbackPlan,
    /// Checks it should pass
    pub test_cases: Vec<TestCase>,
    /// When it was synthesized
    pub created_at: Time,
}

impl CandidateOptimization {
    /// Create a candidate. Scores are stored as given; the validation gate
    /// rejects NaN and out-of-range values.
    pub fn new(
        target_area: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
        risk_score: f64,
        complexity_score: f64,
        change: serde_json::Value,
    ) -> Self {
        Self {
            id: CandidateId::new(),
            target_area: target_area.into(),
            description: description.into(),
            confidence,
            risk_score,
            complexity_score,
            change,
            rollback_plan: RollbackPlan {
                backup_required: true,
                steps: vec!["restore pre-deploy backup".to_string()],
                triggers: vec![RollbackTrigger::DeployFailure],
            },
            test_cases: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Replace the rollback plan.
    pub fn with_rollback_plan(mut self, plan: RollbackPlan) -> Self {
        self.rollback_plan = plan;
        self
    }

    /// Replace the test cases.
    pub fn with_test_cases(mut self, cases: Vec<TestCase>) -> Self {
        self.test_cases = cases;
        self
    }
}

/// An opportunity whose synthesis failed, kept for manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewItem {
    /// Unique identifier
    pub id: ReviewId,
    /// The opportunity that could not be synthesized
    pub opportunity: Opportunity,
    /// Why synthesis failed
    pub reason: String,
    /// When it was filed
    pub filed_at: Time,
}

impl ManualReviewItem {
    /// File an opportunity for review now.
    pub fn new(opportunity: Opportunity, reason: impl Into<String>) -> Self {
        Self {
            id: ReviewId::new(),
            opportunity,
            reason: reason.into(),
            filed_at: chrono::Utc::now(),
        }
    }
}
