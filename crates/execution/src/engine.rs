//! The optimization pipeline - runs the seven-phase loop.
//!
//! ```text
//! Detect → Rank → Generate → Validate → Deploy → Monitor → Iterate → Idle
//! ```
//!
//! Every run ends in `Idle`. A failing phase degrades to its fallback and
//! the run continues; a failing candidate never stops its siblings.

use crate::adapter::{AdapterError, TargetAdapter};
use crate::audit::{AuditSink, TracingAuditSink};
use crate::deploy::{DeployResult, Deployer};
use crate::detect::detect;
use crate::gate::ValidationGate;
use crate::generate::{CandidateSynthesizer, DefaultSynthesizer};
use crate::lock::AreaLocks;
use crate::monitor::{Monitor, MonitorVerdict};
use crate::rank::Ranker;
use crate::schedule::{CycleScheduler, NextCycleSchedule};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use venturi_core::{
    AuditEvent, AuditKind, CandidateModel, CandidateOptimization, DeploymentId, DeploymentOutcome,
    DeploymentRecord, DeploymentStatus, ManualReviewItem, Opportunity, OptimizerError, PipelineConfig,
    ReviewId,
};
use venturi_storage::{Bucket, Storage, StorageError, StorageExt};

/// Rollbacks kept for [`PipelineStatus::recent_rollbacks`].
const RECENT_ROLLBACKS: usize = 20;

/// Deployment records kept in memory; older ones live only in storage.
const HISTORY_LIMIT: usize = 500;

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// Between runs
    Idle,
    /// Collecting opportunities
    Detect,
    /// Ordering opportunities
    Rank,
    /// Synthesizing candidates
    Generate,
    /// Gate check
    Validate,
    /// Applying changes
    Deploy,
    /// Watching deployed changes
    Monitor,
    /// Scheduling the next run
    Iterate,
}

impl PipelinePhase {
    /// Stable name used in logs and audit subjects.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::Detect => "detect",
            PipelinePhase::Rank => "rank",
            PipelinePhase::Generate => "generate",
            PipelinePhase::Validate => "validate",
            PipelinePhase::Deploy => "deploy",
            PipelinePhase::Monitor => "monitor",
            PipelinePhase::Iterate => "iterate",
        }
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Run number
    pub run: u64,
    /// Why the run was cut short, if it was
    pub skipped: Option<String>,
    /// Opportunities found by Detect
    pub detected: usize,
    /// Candidates that reached Validate
    pub generated: usize,
    /// Opportunities filed for manual review
    pub manual_review: usize,
    /// Candidates accepted by the gate
    pub accepted: usize,
    /// Candidates rejected by the gate
    pub rejected: usize,
    /// Candidates deferred to a later run
    pub deferred: usize,
    /// New active deployments
    pub deployed: Vec<DeploymentId>,
    /// Deployments that failed and were restored
    pub failed: Vec<DeploymentId>,
    /// Deployments kept after monitoring
    pub kept: Vec<DeploymentId>,
    /// Deployments rolled back after monitoring
    pub rolled_back: Vec<DeploymentId>,
    /// Deployments still awaiting a monitoring verdict
    pub still_monitoring: Vec<DeploymentId>,
    /// Phases that fell back during this run
    pub degraded: Vec<PipelinePhase>,
    /// Schedule for the next run
    pub schedule: NextCycleSchedule,
    /// Phase when the run returned (always `Idle`)
    pub final_phase: PipelinePhase,
}

impl PipelineReport {
    fn new(run: u64, schedule: NextCycleSchedule) -> Self {
        Self {
            run,
            skipped: None,
            detected: 0,
            generated: 0,
            manual_review: 0,
            accepted: 0,
            rejected: 0,
            deferred: 0,
            deployed: Vec::new(),
            failed: Vec::new(),
            kept: Vec::new(),
            rolled_back: Vec::new(),
            still_monitoring: Vec::new(),
            degraded: Vec::new(),
            schedule,
            final_phase: PipelinePhase::Idle,
        }
    }
}

/// Operator view of the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    /// Current phase
    pub phase: PipelinePhase,
    /// Completed runs
    pub runs: u64,
    /// Deployments still awaiting a monitoring verdict
    pub active: Vec<DeploymentRecord>,
    /// Most recent rollbacks and failed deploys, oldest first
    pub recent_rollbacks: Vec<DeploymentRecord>,
    /// Manual-review items not yet resolved
    pub pending_manual_review: usize,
    /// Consecutive adapter-unavailable results
    pub consecutive_adapter_failures: u32,
    /// Opportunities waiting for their area to free up
    pub deferred: usize,
    /// Areas with an in-flight change
    pub locked_areas: Vec<String>,
    /// Delay before the next run
    pub next_interval: Duration,
}

/// The optimization pipeline.
pub struct OptimizationPipeline {
    config: PipelineConfig,
    adapter: Arc<dyn TargetAdapter>,
    storage: Arc<dyn Storage>,
    audit: Arc<dyn AuditSink>,
    synthesizer: Arc<dyn CandidateSynthesizer>,
    locks: AreaLocks,
    gate: ValidationGate,
    ranker: Ranker,
    scheduler: CycleScheduler,
    schedule: NextCycleSchedule,
    phase: PipelinePhase,
    runs: u64,
    deferred: Vec<Opportunity>,
    submitted: Vec<CandidateOptimization>,
    monitoring: Vec<DeploymentRecord>,
    history: Vec<DeploymentRecord>,
    recent_rollbacks: VecDeque<DeploymentRecord>,
    outcomes: Vec<DeploymentOutcome>,
    manual_review: Vec<ManualReviewItem>,
    adapter_failures: u32,
    status_tx: watch::Sender<PipelineStatus>,
}

impl OptimizationPipeline {
    /// Create a pipeline with the default synthesizer and a tracing audit sink.
    pub fn new(config: PipelineConfig, adapter: Arc<dyn TargetAdapter>, storage: Arc<dyn Storage>) -> Self {
        let scheduler = CycleScheduler::from_config(&config);
        let schedule = scheduler.initial();
        let (status_tx, _) = watch::channel(PipelineStatus {
            phase: PipelinePhase::Idle,
            runs: 0,
            active: Vec::new(),
            recent_rollbacks: Vec::new(),
            pending_manual_review: 0,
            consecutive_adapter_failures: 0,
            deferred: 0,
            locked_areas: Vec::new(),
            next_interval: schedule.interval,
        });
        Self {
            synthesizer: Arc::new(DefaultSynthesizer::new(&config)),
            gate: ValidationGate::from_config(&config),
            ranker: Ranker::from_config(&config),
            schedule,
            scheduler,
            adapter,
            storage,
            audit: Arc::new(TracingAuditSink),
            locks: AreaLocks::new(),
            phase: PipelinePhase::Idle,
            runs: 0,
            deferred: Vec::new(),
            submitted: Vec::new(),
            monitoring: Vec::new(),
            history: Vec::new(),
            recent_rollbacks: VecDeque::new(),
            outcomes: Vec::new(),
            manual_review: Vec::new(),
            adapter_failures: 0,
            status_tx,
            config,
        }
    }

    /// Set the audit sink.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Set the candidate synthesizer.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn CandidateSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Share an existing lock set.
    pub fn with_locks(mut self, locks: AreaLocks) -> Self {
        self.locks = locks;
        self.publish_status();
        self
    }

    /// Resume from storage: active deployments are monitored again and
    /// unresolved manual-review items are reloaded.
    ///
    /// Returns the number of deployments resumed.
    pub async fn recover(&mut self) -> Result<usize, StorageError> {
        let records = self.storage.list_deployments().await?;
        let mut resumed = 0;
        for record in records {
            if record.is_active() && record.concluded_at.is_none() {
                if self.monitoring.iter().any(|r| r.id == record.id) {
                    continue;
                }
                self.locks.try_acquire(&record.target_area);
                self.monitoring.push(record.clone());
                resumed += 1;
            }
            self.remember(record);
        }
        self.manual_review = self.storage.list_manual_review().await?;
        info!(
            "Recovered {} active deployment(s), {} manual-review item(s)",
            resumed,
            self.manual_review.len()
        );
        self.publish_status();
        Ok(resumed)
    }

    /// Queue an externally built candidate for the next run's Validate phase.
    pub fn submit(&mut self, candidate: CandidateOptimization) {
        debug!("Candidate {} submitted for '{}'", candidate.id, candidate.target_area);
        self.submitted.push(candidate);
        self.publish_status();
    }

    /// Run the pipeline once over the given candidate models.
    pub async fn run(&mut self, models: Vec<CandidateModel>) -> PipelineReport {
        self.runs += 1;
        let mut report = PipelineReport::new(self.runs, self.schedule.clone());
        info!("Pipeline run {} with {} model(s)", self.runs, models.len());

        // 1. Detect
        self.enter(PipelinePhase::Detect).await;
        let deferred = std::mem::take(&mut self.deferred);
        let opportunities = match detect(&models, &deferred) {
            Ok(found) => found,
            Err(e) => {
                self.deferred = deferred;
                let skipped = OptimizerError::CycleSkipped(e.to_string());
                self.degrade(&mut report, PipelinePhase::Detect, &skipped.to_string()).await;
                report.skipped = Some(skipped.to_string());
                return self.finish(report).await;
            }
        };
        report.detected = opportunities.len();

        // 2. Rank
        self.enter(PipelinePhase::Rank).await;
        let ranking = self.ranker.rank(opportunities, &self.schedule.area_weights);
        if ranking.fell_back {
            self.degrade(&mut report, PipelinePhase::Rank, "non-finite priority, keeping detection order")
                .await;
        }

        // 3. Generate
        self.enter(PipelinePhase::Generate).await;
        let mut ranked = ranking.ranked;
        if ranked.len() > self.config.top_k_candidates_per_cycle {
            debug!(
                "Keeping top {} of {} opportunities",
                self.config.top_k_candidates_per_cycle,
                ranked.len()
            );
            ranked.truncate(self.config.top_k_candidates_per_cycle);
        }
        let mut candidates: Vec<(Option<Opportunity>, CandidateOptimization)> = Vec::new();
        for opportunity in ranked {
            match self.synthesizer.synthesize(&opportunity).await {
                Ok(candidate) => {
                    self.archive_candidate(&candidate).await;
                    candidates.push((Some(opportunity), candidate));
                }
                Err(e) => {
                    report.manual_review += 1;
                    self.file_manual_review(opportunity, e.to_string()).await;
                }
            }
        }
        for candidate in std::mem::take(&mut self.submitted) {
            self.archive_candidate(&candidate).await;
            candidates.push((None, candidate));
        }
        report.generated = candidates.len();

        // 4. Validate
        self.enter(PipelinePhase::Validate).await;
        let mut accepted = Vec::new();
        for (opportunity, candidate) in candidates {
            match self.gate.check(&candidate) {
                Ok(()) => accepted.push((opportunity, candidate)),
                Err(OptimizerError::ValidationRejected { reasons, .. }) => {
                    report.rejected += 1;
                    self.emit(
                        AuditKind::ValidationRejected,
                        candidate.id.to_string(),
                        format!("'{}' rejected: {}", candidate.target_area, reasons.join("; ")),
                    )
                    .await;
                }
                Err(e) => {
                    report.rejected += 1;
                    self.emit(AuditKind::ValidationRejected, candidate.id.to_string(), e.to_string())
                        .await;
                }
            }
        }
        report.accepted = accepted.len();

        // 5. Deploy
        self.enter(PipelinePhase::Deploy).await;
        let mut regressed = Vec::new();
        for (opportunity, candidate) in accepted {
            let area = candidate.target_area.clone();
            let result = Deployer::new(self.adapter.as_ref(), &self.locks, self.config.deploy_timeout())
                .deploy(&candidate)
                .await;
            match result {
                DeployResult::Deployed(record) => {
                    self.adapter_failures = 0;
                    report.deployed.push(record.id);
                    self.emit(
                        AuditKind::Deployed,
                        &area,
                        format!("candidate {} deployed as {}", candidate.id, record.id),
                    )
                    .await;
                    self.persist(&record).await;
                    self.monitoring.push(record);
                }
                DeployResult::Failed { record, restore_failed } => {
                    report.failed.push(record.id);
                    regressed.push(area.clone());
                    let error = OptimizerError::DeployFailed {
                        candidate: candidate.id,
                        reason: record.reason.clone().unwrap_or_default(),
                    };
                    let message = if restore_failed {
                        format!("{} (area NOT restored)", error)
                    } else {
                        format!("{} (area restored)", error)
                    };
                    self.emit(AuditKind::DeployFailed, &area, message).await;
                    self.conclude(record).await;
                }
                DeployResult::Deferred => {
                    report.deferred += 1;
                    self.emit(
                        AuditKind::Deferred,
                        &area,
                        format!("candidate {} waits for the in-flight change", candidate.id),
                    )
                    .await;
                    self.defer(opportunity, candidate);
                }
                DeployResult::Unavailable(reason) => {
                    report.deferred += 1;
                    self.adapter_unavailable(&area, &reason).await;
                    self.defer(opportunity, candidate);
                }
            }
        }

        // 6. Monitor
        self.enter(PipelinePhase::Monitor).await;
        let (owed, watching): (Vec<_>, Vec<_>) = std::mem::take(&mut self.monitoring)
            .into_iter()
            .partition(|r| r.pending_rollback.is_some());
        for record in owed {
            let reason = record.pending_rollback.clone().unwrap_or_default();
            info!("Retrying owed rollback of {}", record.id);
            self.roll_back(record, reason, &mut report, &mut regressed).await;
        }
        let verdicts = {
            let monitor = Monitor::new(self.adapter.as_ref(), &self.config);
            join_all(watching.iter().map(|r| monitor.watch(&r.target_area))).await
        };
        let mut kept = Vec::new();
        for (record, verdict) in watching.into_iter().zip(verdicts) {
            let area = record.target_area.clone();
            match verdict {
                MonitorVerdict::Keep {
                    effectiveness,
                    error_rate,
                } => {
                    self.adapter_failures = 0;
                    let mut record = record;
                    record.effectiveness_score = Some(effectiveness);
                    record.error_rate = Some(error_rate);
                    record.mark_kept();
                    report.kept.push(record.id);
                    kept.push(area.clone());
                    self.emit(
                        AuditKind::Kept,
                        &area,
                        format!(
                            "{} kept (effectiveness {:.2}, error rate {:.3})",
                            record.id, effectiveness, error_rate
                        ),
                    )
                    .await;
                    self.locks.release(&area);
                    self.conclude(record).await;
                }
                MonitorVerdict::Rollback {
                    trigger,
                    reason,
                    effectiveness,
                    error_rate,
                } => {
                    self.adapter_failures = 0;
                    let mut record = record;
                    record.effectiveness_score = effectiveness;
                    record.error_rate = error_rate;
                    debug!("Rolling back {} ({:?})", record.id, trigger);
                    self.roll_back(record, reason, &mut report, &mut regressed).await;
                }
                MonitorVerdict::Unavailable(reason) => {
                    self.adapter_unavailable(&area, &reason).await;
                    report.still_monitoring.push(record.id);
                    self.monitoring.push(record);
                }
            }
        }

        // 7. Iterate
        self.enter(PipelinePhase::Iterate).await;
        self.schedule = match self.scheduler.next(&regressed, &kept) {
            Ok(schedule) => schedule,
            Err(e) => {
                self.degrade(&mut report, PipelinePhase::Iterate, &e.to_string()).await;
                self.scheduler.fallback()
            }
        };
        report.schedule = self.schedule.clone();

        self.finish(report).await
    }

    /// Current phase.
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Operator status.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            phase: self.phase,
            runs: self.runs,
            active: self.monitoring.clone(),
            recent_rollbacks: self.recent_rollbacks.iter().cloned().collect(),
            pending_manual_review: self.manual_review.len(),
            consecutive_adapter_failures: self.adapter_failures,
            deferred: self.deferred.len() + self.submitted.len(),
            locked_areas: self.locks.held(),
            next_interval: self.schedule.interval,
        }
    }

    /// Outcomes not yet handed to the learner.
    pub fn outcomes(&self) -> &[DeploymentOutcome] {
        &self.outcomes
    }

    /// Hand pending outcomes to the learner.
    pub fn take_outcomes(&mut self) -> Vec<DeploymentOutcome> {
        std::mem::take(&mut self.outcomes)
    }

    /// Deployment records seen by this pipeline, oldest first.
    pub fn history(&self) -> &[DeploymentRecord] {
        &self.history
    }

    /// Schedule for the next run.
    pub fn schedule(&self) -> &NextCycleSchedule {
        &self.schedule
    }

    /// Unresolved manual-review items.
    pub fn manual_review(&self) -> &[ManualReviewItem] {
        &self.manual_review
    }

    /// Mark a manual-review item as handled. False if it is unknown.
    pub async fn resolve_manual_review(&mut self, id: ReviewId) -> bool {
        let before = self.manual_review.len();
        self.manual_review.retain(|item| item.id != id);
        if self.manual_review.len() == before {
            return false;
        }
        if let Err(e) = self.storage.delete(Bucket::ManualReview, &id.to_string()).await {
            warn!("Failed to delete manual-review item {}: {}", id, e);
        }
        self.publish_status();
        true
    }

    /// Area locks shared with this pipeline.
    pub fn locks(&self) -> &AreaLocks {
        &self.locks
    }

    /// Configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Follow the status as it is published at each phase transition.
    ///
    /// Readers never wait on a running cycle.
    pub fn subscribe_status(&self) -> watch::Receiver<PipelineStatus> {
        self.status_tx.subscribe()
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.status());
    }

    async fn enter(&mut self, phase: PipelinePhase) {
        let from = self.phase;
        self.phase = phase;
        self.publish_status();
        debug!("Pipeline phase {} -> {}", from, phase);
        self.emit(AuditKind::PhaseTransition, phase.as_str(), format!("{} -> {}", from, phase))
            .await;
    }

    async fn finish(&mut self, mut report: PipelineReport) -> PipelineReport {
        self.enter(PipelinePhase::Idle).await;
        report.final_phase = self.phase;
        match self.storage.prune_audit_events(self.config.audit_retention).await {
            Ok(0) => {}
            Ok(pruned) => debug!("Pruned {} old audit event(s)", pruned),
            Err(e) => warn!("Failed to prune audit events: {}", e),
        }
        info!(
            "Pipeline run {} done: {} deployed, {} failed, {} kept, {} rolled back, {} rejected, next in {:?}",
            report.run,
            report.deployed.len(),
            report.failed.len(),
            report.kept.len(),
            report.rolled_back.len(),
            report.rejected,
            report.schedule.interval
        );
        report
    }

    async fn degrade(&mut self, report: &mut PipelineReport, phase: PipelinePhase, reason: &str) {
        report.degraded.push(phase);
        self.emit(AuditKind::PhaseDegraded, phase.as_str(), reason).await;
    }

    async fn emit(&self, kind: AuditKind, subject: impl Into<String>, message: impl Into<String>) {
        let event = AuditEvent::new(kind, subject, message);
        self.audit.record(&event);
        if let Err(e) = self.storage.save_audit_event(&event).await {
            warn!("Failed to persist audit event {}: {}", event.id, e);
        }
    }

    async fn adapter_unavailable(&mut self, area: &str, reason: &str) {
        self.adapter_failures += 1;
        self.emit(
            AuditKind::AdapterUnavailable,
            area,
            OptimizerError::AdapterUnavailable(reason.to_string()).to_string(),
        )
        .await;
        if self.adapter_failures == self.config.adapter_failure_alert_threshold {
            self.emit(
                AuditKind::AdapterDegraded,
                self.adapter.name().to_string(),
                format!("{} consecutive adapter failures", self.adapter_failures),
            )
            .await;
        }
    }

    /// Restore a deployment's backup. If the adapter is unreachable the
    /// rollback stays owed on the record and is retried next run before any
    /// health polling.
    async fn roll_back(
        &mut self,
        mut record: DeploymentRecord,
        reason: String,
        report: &mut PipelineReport,
        regressed: &mut Vec<String>,
    ) {
        let area = record.target_area.clone();
        match self.restore(&record).await {
            Ok(()) => {
                record.mark_rolled_back(reason.clone());
                report.rolled_back.push(record.id);
                regressed.push(area.clone());
                self.deferred.retain(|o| o.area != area);
                self.emit(AuditKind::RolledBack, &area, format!("{} rolled back: {}", record.id, reason))
                    .await;
                self.locks.release(&area);
                self.conclude(record).await;
            }
            Err(e) if e.is_unavailable() => {
                self.adapter_unavailable(&area, &e.to_string()).await;
                if record.pending_rollback.is_none() {
                    record.mark_rollback_pending(reason);
                    self.persist(&record).await;
                }
                report.still_monitoring.push(record.id);
                self.monitoring.push(record);
            }
            Err(e) => {
                record.status = DeploymentStatus::Failed;
                record.reason = Some(format!("{}; restore failed: {}", reason, e));
                record.concluded_at = Some(chrono::Utc::now());
                record.pending_rollback = None;
                report.failed.push(record.id);
                regressed.push(area.clone());
                self.deferred.retain(|o| o.area != area);
                self.emit(
                    AuditKind::DeployFailed,
                    &area,
                    format!("{} could not be rolled back: {}", record.id, e),
                )
                .await;
                self.locks.release(&area);
                self.conclude(record).await;
            }
        }
    }

    async fn restore(&self, record: &DeploymentRecord) -> Result<(), AdapterError> {
        let backup = record
            .backup_ref
            .as_ref()
            .ok_or_else(|| AdapterError::UnknownBackup(format!("{} has no backup", record.id)))?;
        match tokio::time::timeout(self.config.deploy_timeout(), self.adapter.restore(backup)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Unavailable(format!("restore of {} timed out", backup))),
        }
    }

    fn defer(&mut self, opportunity: Option<Opportunity>, candidate: CandidateOptimization) {
        match opportunity {
            Some(opportunity) => self.deferred.push(opportunity),
            None => self.submitted.push(candidate),
        }
    }

    async fn conclude(&mut self, record: DeploymentRecord) {
        if record.status != DeploymentStatus::Active {
            self.recent_rollbacks.push_back(record.clone());
            while self.recent_rollbacks.len() > RECENT_ROLLBACKS {
                self.recent_rollbacks.pop_front();
            }
        }
        self.outcomes.push(record.outcome());
        self.persist(&record).await;
    }

    async fn persist(&mut self, record: &DeploymentRecord) {
        if let Err(e) = self.storage.save_deployment(record).await {
            warn!("Failed to persist deployment {}: {}", record.id, e);
        }
        self.remember(record.clone());
    }

    fn remember(&mut self, record: DeploymentRecord) {
        match self.history.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => {
                self.history.push(record);
                if self.history.len() > HISTORY_LIMIT {
                    self.history.remove(0);
                }
            }
        }
    }

    async fn archive_candidate(&self, candidate: &CandidateOptimization) {
        if let Err(e) = self.storage.save_candidate(candidate).await {
            warn!("Failed to archive candidate {}: {}", candidate.id, e);
        }
    }

    async fn file_manual_review(&mut self, opportunity: Opportunity, reason: String) {
        let item = ManualReviewItem::new(opportunity, reason);
        if let Err(e) = self.storage.save_manual_review(&item).await {
            warn!("Failed to persist manual-review item {}: {}", item.id, e);
        }
        self.emit(
            AuditKind::ManualReviewFiled,
            &item.opportunity.area,
            format!("{} for '{}': {}", item.opportunity.kind, item.opportunity.area, item.reason),
        )
        .await;
        self.manual_review.push(item);
    }
}
