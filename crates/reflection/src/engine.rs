//! Experience learner - the slow-path learning cycle.

use crate::analyzer::{Analyzer, OUTCOME_METRIC};
use crate::buffer::RingBuffer;
use crate::evolution::{TraitAdjustment, TraitEvolver};
use crate::intake::{EnvironmentContext, IntakeFilter};
use crate::model::OpportunityBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use venturi_core::{
    default_traits, snapshot_traits, CandidateModel, CognitiveTrait, DeploymentOutcome, Experience,
    ExperienceId, LearnerConfig, Metric, Observation,
};

/// Number of recent candidate models kept for inspection.
const MODEL_HISTORY: usize = 32;

/// Persistable copy of the learner state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerSnapshot {
    /// Experiences, oldest first
    pub experiences: Vec<Experience>,
    /// Current traits
    pub traits: Vec<CognitiveTrait>,
    /// Completed cycles
    pub cycles: u64,
    /// When the snapshot was taken
    pub taken_at: venturi_core::Time,
}

/// Learns from telemetry and emits a candidate model per cycle.
///
/// Cycle stages: intake filtering, pattern reflection, trait evolution,
/// candidate-model generation. Every cycle returns a model, possibly empty.
pub struct ExperienceLearner {
    config: LearnerConfig,
    experiences: RingBuffer<Experience>,
    models: RingBuffer<CandidateModel>,
    traits: Vec<CognitiveTrait>,
    last_adjustments: Vec<TraitAdjustment>,
    cycles: u64,
}

impl ExperienceLearner {
    /// Create a learner with default traits and an empty buffer.
    pub fn new(config: LearnerConfig) -> Self {
        Self {
            experiences: RingBuffer::new(config.ring_buffer_capacity),
            models: RingBuffer::new(MODEL_HISTORY),
            traits: default_traits(),
            last_adjustments: Vec::new(),
            cycles: 0,
            config,
        }
    }

    /// Run one learning cycle over a batch of raw telemetry.
    pub fn run_cycle(&mut self, raw: &[Observation], context: &EnvironmentContext) -> CandidateModel {
        self.cycles += 1;
        let cycle = self.cycles;

        // Intake
        let filter = match IntakeFilter::new(&self.config, context) {
            Ok(filter) => filter,
            Err(e) => {
                warn!("Learner cycle {} skipped, {} observations discarded: {}", cycle, raw.len(), e);
                self.last_adjustments.clear();
                return self.remember(CandidateModel::skipped(cycle, self.traits.clone(), e.to_string()));
            }
        };
        let batch = filter.filter(raw, &self.traits);
        let accepted = batch.experiences.len();
        let evicted = self.experiences.extend(batch.experiences);
        debug!(
            "Intake: {} accepted, {} discarded, {} evicted",
            accepted, batch.discarded, evicted
        );

        // Reflection
        let window = self.experiences.recent(self.config.reflection_window);
        let insights = Analyzer::new(&self.config, context.target_latency_ms).analyze(&window);

        // Evolution
        let evolver = TraitEvolver::new(&self.config);
        let mut adjustments = evolver.suggest(&window, &insights);
        evolver.apply(&mut self.traits, &mut adjustments);

        // Generation
        let opportunities = OpportunityBuilder::new(&self.config, &self.traits).build(&insights);

        info!(
            "Learner cycle {}: {} insights, {} opportunities, {} experiences buffered",
            cycle,
            insights.len(),
            opportunities.len(),
            self.experiences.len()
        );

        self.last_adjustments = adjustments;
        let mut model = CandidateModel::empty(cycle, self.traits.clone());
        model.insights = insights;
        model.opportunities = opportunities;
        self.remember(model)
    }

    /// Feed a concluded deployment back in as an experience.
    pub fn record_outcome(&mut self, outcome: &DeploymentOutcome) {
        let succeeded = outcome.succeeded();
        let effectiveness = outcome
            .effectiveness_score
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0));
        let quality = effectiveness.unwrap_or(if succeeded { 1.0 } else { 0.0 });

        debug!(
            "Recording {} outcome for area {} (quality {:.2})",
            outcome.status, outcome.target_area, quality
        );
        self.experiences.push(Experience {
            id: ExperienceId::new(),
            recorded_at: outcome.observed_at,
            area: outcome.target_area.clone(),
            metric: Metric::Custom(OUTCOME_METRIC.to_string()),
            value: effectiveness.unwrap_or(0.0),
            quality,
            failure: !succeeded,
            traits: snapshot_traits(&self.traits),
        });
    }

    /// Copy out the current state.
    pub fn snapshot(&self) -> LearnerSnapshot {
        LearnerSnapshot {
            experiences: self.experiences.to_vec(),
            traits: self.traits.clone(),
            cycles: self.cycles,
            taken_at: chrono::Utc::now(),
        }
    }

    /// Replace the state with a snapshot. Keeps the newest experiences if the
    /// snapshot holds more than the configured capacity.
    pub fn restore(&mut self, snapshot: LearnerSnapshot) {
        self.experiences = RingBuffer::from_items(self.config.ring_buffer_capacity, snapshot.experiences);
        self.traits = snapshot
            .traits
            .into_iter()
            .map(|mut t| {
                t.current = t.current.clamp(0.0, 1.0);
                t
            })
            .collect();
        if self.traits.is_empty() {
            self.traits = default_traits();
        }
        self.cycles = snapshot.cycles;
        info!(
            "Learner restored: {} experiences, cycle {}",
            self.experiences.len(),
            self.cycles
        );
    }

    /// Return every trait to its baseline.
    pub fn reinitialize_traits(&mut self) {
        for t in &mut self.traits {
            t.reset();
        }
        self.last_adjustments.clear();
    }

    /// Current traits.
    pub fn traits(&self) -> &[CognitiveTrait] {
        &self.traits
    }

    /// Adjustments applied in the last cycle.
    pub fn last_adjustments(&self) -> &[TraitAdjustment] {
        &self.last_adjustments
    }

    /// Buffered experiences, oldest first.
    pub fn experiences(&self) -> &RingBuffer<Experience> {
        &self.experiences
    }

    /// Recent candidate models, oldest first.
    pub fn recent_models(&self) -> Vec<&CandidateModel> {
        self.models.recent(MODEL_HISTORY)
    }

    /// Completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Configuration in use.
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    fn remember(&mut self, model: CandidateModel) -> CandidateModel {
        self.models.push(model.clone());
        model
    }
}
