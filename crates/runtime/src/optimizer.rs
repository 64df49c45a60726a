//! Optimizer lifecycle and the learner/pipeline feedback loop.

use crate::RuntimeError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use venturi_control::{ControllerState, SharedController};
use venturi_core::{CognitiveTrait, Metric, Observation, OptimizerError, VenturiConfig};
use venturi_execution::{OptimizationPipeline, PipelineReport, PipelineStatus, TargetAdapter};
use venturi_reflection::{EnvironmentContext, ExperienceLearner, LearnerSnapshot};
use venturi_storage::{Bucket, Storage, StorageError, StorageExt};

/// Key of the learner snapshot in [`Bucket::Learner`].
pub const SNAPSHOT_KEY: &str = "snapshot";

/// Result of one slow-path cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Learner cycle number
    pub cycle: u64,
    /// Observations drained from the telemetry queue
    pub telemetry: usize,
    /// Why the learner skipped, if it did
    pub learner_skipped: Option<String>,
    /// Opportunities in the candidate model
    pub opportunities: usize,
    /// Deployment outcomes fed back into the learner
    pub outcomes_fed: usize,
    /// Whether the learner snapshot was written
    pub persisted: bool,
    /// Pipeline run summary
    pub pipeline: PipelineReport,
}

/// Operator view of the whole optimizer.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    /// Fast-path state
    pub controller: ControllerState,
    /// Completed learner cycles
    pub learner_cycles: u64,
    /// Experiences currently buffered
    pub experiences: usize,
    /// Current trait values
    pub traits: Vec<CognitiveTrait>,
    /// Observations waiting in the telemetry queue
    pub queued_telemetry: usize,
    /// Observations dropped because the queue was full
    pub dropped_telemetry: u64,
    /// Whether the background task is running
    pub background: bool,
    /// Pipeline status
    pub pipeline: PipelineStatus,
}

/// State shared between the handle and the background task.
struct Shared {
    learner: Mutex<ExperienceLearner>,
    pipeline: Mutex<OptimizationPipeline>,
    // Published by the pipeline at each phase; readable while a cycle runs.
    status: watch::Receiver<PipelineStatus>,
    telemetry: Mutex<mpsc::Receiver<Observation>>,
    storage: Arc<dyn Storage>,
    // Serializes cycles started by the task and by explicit calls.
    cycle: Mutex<()>,
}

struct Background {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// The two-tier optimizer.
///
/// `observe` is the fast path and never blocks. `run_cycle` (directly or
/// from the task started by `spawn`) is the slow path.
pub struct Optimizer {
    config: VenturiConfig,
    controller: SharedController,
    sender: mpsc::Sender<Observation>,
    dropped: Arc<AtomicU64>,
    shared: Arc<Shared>,
    background: Option<Background>,
}

impl Optimizer {
    /// Validate the config, restore the learner snapshot and resume any
    /// deployments still being monitored.
    pub async fn init(
        config: VenturiConfig,
        adapter: Arc<dyn TargetAdapter>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;

        let mut learner = ExperienceLearner::new(config.learner.clone());
        match storage.load_json::<LearnerSnapshot>(Bucket::Learner, SNAPSHOT_KEY).await {
            Ok(Some(snapshot)) => {
                info!(
                    "Restored learner snapshot: {} experience(s), {} cycle(s)",
                    snapshot.experiences.len(),
                    snapshot.cycles
                );
                learner.restore(snapshot);
            }
            Ok(None) => debug!("No learner snapshot, starting fresh"),
            Err(StorageError::Json(e)) => warn!("Ignoring unreadable learner snapshot: {}", e),
            Err(e) => return Err(e.into()),
        }

        let mut pipeline = OptimizationPipeline::new(config.pipeline.clone(), adapter, storage.clone());
        pipeline.recover().await?;
        let status = pipeline.subscribe_status();

        let (sender, receiver) = mpsc::channel(config.telemetry_queue_capacity);

        Ok(Self {
            controller: SharedController::new(config.controller.clone()),
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
            shared: Arc::new(Shared {
                learner: Mutex::new(learner),
                pipeline: Mutex::new(pipeline),
                status,
                telemetry: Mutex::new(receiver),
                storage,
                cycle: Mutex::new(()),
            }),
            background: None,
            config,
        })
    }

    /// Fast path: adjust the controller on latency samples and queue the
    /// observation for the next learning cycle.
    ///
    /// Malformed values are rejected and not queued. A full queue drops the
    /// observation with a warning.
    pub fn observe(&self, observation: Observation) -> Result<ControllerState, OptimizerError> {
        if !observation.is_well_formed() {
            return Err(OptimizerError::InvalidObservation(format!(
                "{} = {}",
                observation.metric, observation.value
            )));
        }

        let state = if observation.metric == Metric::LatencyMs {
            self.controller.adjust(observation.value)?
        } else {
            self.controller.state()
        };

        match self.sender.try_send(observation) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Telemetry queue full, dropped {} observation ({} dropped so far)",
                    dropped.metric, total
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Telemetry queue closed, observation dropped");
            }
        }
        Ok(state)
    }

    /// Slow path: one learner cycle, one pipeline run, outcomes fed back.
    pub async fn run_cycle(&self, context: &EnvironmentContext) -> CycleReport {
        self.shared.run_cycle(context).await
    }

    /// Start a background task that runs a cycle after each scheduled
    /// interval until [`shutdown`](Self::shutdown).
    pub fn spawn(&mut self, context: EnvironmentContext) -> Result<(), RuntimeError> {
        if self.background.as_ref().is_some_and(|b| !b.handle.is_finished()) {
            return Err(RuntimeError::AlreadyRunning);
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            info!("Optimizer task started");
            loop {
                let interval = shared.status.borrow().next_interval;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.wait_for(|stop| *stop) => break,
                }
                let report = shared.run_cycle(&context).await;
                debug!(
                    "Background cycle {} done, next in {:?}",
                    report.cycle, report.pipeline.schedule.interval
                );
            }
            info!("Optimizer task stopped");
        });

        self.background = Some(Background { shutdown, handle });
        Ok(())
    }

    /// Stop the background task and persist the learner.
    ///
    /// A cycle already in progress is allowed to finish first.
    pub async fn shutdown(&mut self) -> Result<(), RuntimeError> {
        if let Some(background) = self.background.take() {
            let _ = background.shutdown.send(true);
            if let Err(e) = background.handle.await {
                warn!("Optimizer task ended abnormally: {}", e);
            }
        }
        let _cycle = self.shared.cycle.lock().await;
        self.shared.persist().await?;
        info!("Optimizer shut down");
        Ok(())
    }

    /// Whole-system status.
    ///
    /// Pipeline figures come from the last published phase, so this returns
    /// promptly even while a cycle is monitoring.
    pub async fn status(&self) -> RuntimeStatus {
        let (learner_cycles, experiences, traits) = {
            let learner = self.shared.learner.lock().await;
            (learner.cycles(), learner.experiences().len(), learner.traits().to_vec())
        };
        RuntimeStatus {
            controller: self.controller.state(),
            learner_cycles,
            experiences,
            traits,
            queued_telemetry: self.sender.max_capacity() - self.sender.capacity(),
            dropped_telemetry: self.dropped.load(Ordering::Relaxed),
            background: self.background.as_ref().is_some_and(|b| !b.handle.is_finished()),
            pipeline: self.shared.status.borrow().clone(),
        }
    }

    /// Context built from the controller's latency target.
    pub fn default_context(&self) -> EnvironmentContext {
        EnvironmentContext::new(self.config.controller.target_latency_ms)
    }

    /// Cloneable fast-path handle for other producers.
    pub fn controller(&self) -> SharedController {
        self.controller.clone()
    }

    /// Delay before the next scheduled cycle.
    pub async fn next_interval(&self) -> Duration {
        self.shared.status.borrow().next_interval
    }

    /// Configuration in use.
    pub fn config(&self) -> &VenturiConfig {
        &self.config
    }
}

impl Shared {
    async fn run_cycle(&self, context: &EnvironmentContext) -> CycleReport {
        let _cycle = self.cycle.lock().await;

        let telemetry = {
            let mut receiver = self.telemetry.lock().await;
            let mut batch = Vec::new();
            while let Ok(observation) = receiver.try_recv() {
                batch.push(observation);
            }
            batch
        };

        let model = self.learner.lock().await.run_cycle(&telemetry, context);
        let cycle = model.cycle;
        let learner_skipped = model.skipped.clone();
        let opportunities = model.opportunities.len();

        let (pipeline, outcomes) = {
            let mut pipeline = self.pipeline.lock().await;
            let report = pipeline.run(vec![model]).await;
            (report, pipeline.take_outcomes())
        };

        {
            let mut learner = self.learner.lock().await;
            for outcome in &outcomes {
                learner.record_outcome(outcome);
            }
        }

        let persisted = match self.persist().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist learner snapshot: {}", e);
                false
            }
        };

        info!(
            "Cycle {}: {} observation(s), {} opportunity(ies), {} deployed, {} rolled back, {} outcome(s) fed back",
            cycle,
            telemetry.len(),
            opportunities,
            pipeline.deployed.len(),
            pipeline.rolled_back.len(),
            outcomes.len()
        );

        CycleReport {
            cycle,
            telemetry: telemetry.len(),
            learner_skipped,
            opportunities,
            outcomes_fed: outcomes.len(),
            persisted,
            pipeline,
        }
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let snapshot = self.learner.lock().await.snapshot();
        self.storage.save_json(Bucket::Learner, SNAPSHOT_KEY, &snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use venturi_execution::{HealthMetrics, InMemoryTarget, PipelinePhase};
    use venturi_storage::MemoryStorage;

    fn spikes(n: usize) -> Vec<Observation> {
        (0..n).map(|_| Observation::latency(300.0).in_area("ingest")).collect()
    }

    async fn optimizer(target: Arc<InMemoryTarget>, storage: Arc<MemoryStorage>) -> Optimizer {
        Optimizer::init(VenturiConfig::default(), target, storage).await.unwrap()
    }

    fn ingest_target() -> Arc<InMemoryTarget> {
        Arc::new(InMemoryTarget::new().with_area("ingest", json!({"max_batch_size": 100})))
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_config() {
        let mut config = VenturiConfig::default();
        config.telemetry_queue_capacity = 0;
        let result = Optimizer::init(config, ingest_target(), Arc::new(MemoryStorage::new())).await;
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[tokio::test]
    async fn test_observe_drives_controller_and_queue() {
        let opt = optimizer(ingest_target(), Arc::new(MemoryStorage::new())).await;
        let initial = opt.controller().state().aggressiveness;

        let state = opt.observe(Observation::latency(500.0)).unwrap();
        assert!(state.aggressiveness < initial);

        // Error counts are queued but do not move the controller
        let after = opt.observe(Observation::errors(2.0)).unwrap();
        assert_eq!(after, state);

        assert!(matches!(
            opt.observe(Observation::latency(f64::NAN)),
            Err(OptimizerError::InvalidObservation(_))
        ));
        assert_eq!(opt.status().await.queued_telemetry, 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let mut config = VenturiConfig::default();
        config.telemetry_queue_capacity = 2;
        let opt = Optimizer::init(config, ingest_target(), Arc::new(MemoryStorage::new()))
            .await
            .unwrap();

        for observation in spikes(3) {
            opt.observe(observation).unwrap();
        }
        let status = opt.status().await;
        assert_eq!(status.queued_telemetry, 2);
        assert_eq!(status.dropped_telemetry, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kept_change_feeds_success_back() {
        let target = ingest_target();
        target.set_health("ingest", HealthMetrics::new(0.9, 0.0, 50));
        let opt = optimizer(target.clone(), Arc::new(MemoryStorage::new())).await;

        for observation in spikes(20) {
            opt.observe(observation).unwrap();
        }
        let report = opt.run_cycle(&opt.default_context()).await;

        assert_eq!(report.telemetry, 20);
        assert_eq!(report.pipeline.deployed.len(), 1);
        assert_eq!(report.pipeline.kept.len(), 1);
        assert_eq!(report.outcomes_fed, 1);
        assert!(report.persisted);
        assert_eq!(target.area_json("ingest").unwrap()["max_batch_size"], json!(80));

        let status = opt.status().await;
        assert!(status.pipeline.locked_areas.is_empty());
        assert_eq!(status.queued_telemetry, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_answers_while_cycle_is_monitoring() {
        let target = ingest_target();
        target.set_health("ingest", HealthMetrics::new(0.9, 0.0, 50));
        let opt = optimizer(target, Arc::new(MemoryStorage::new())).await;
        for observation in spikes(20) {
            opt.observe(observation).unwrap();
        }
        let context = opt.default_context();
        let mut phases = opt.shared.status.clone();

        let cycle = opt.run_cycle(&context);
        tokio::pin!(cycle);
        tokio::select! {
            _ = &mut cycle => panic!("cycle finished before monitoring started"),
            reached = phases.wait_for(|s| s.phase == PipelinePhase::Monitor) => {
                reached.unwrap();
            }
        }

        let status = tokio::time::timeout(Duration::from_secs(1), opt.status())
            .await
            .expect("status waited on the running cycle");
        assert_eq!(status.pipeline.phase, PipelinePhase::Monitor);
        assert_eq!(status.pipeline.active.len(), 1);
        assert_eq!(status.pipeline.locked_areas, vec!["ingest".to_string()]);

        let report = cycle.await;
        assert_eq!(report.pipeline.kept.len(), 1);
        let status = opt.status().await;
        assert_eq!(status.pipeline.phase, PipelinePhase::Idle);
        assert!(status.pipeline.active.is_empty());
        assert_eq!(opt.next_interval().await, report.pipeline.schedule.interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_feeds_back_and_lowers_next_confidence() {
        let target = ingest_target();
        target.set_health("ingest", HealthMetrics::new(0.2, 0.0, 50));
        let storage = Arc::new(MemoryStorage::new());
        let opt = optimizer(target.clone(), storage.clone()).await;
        let context = opt.default_context();

        for observation in spikes(20) {
            opt.observe(observation).unwrap();
        }
        let first = opt.run_cycle(&context).await;
        assert_eq!(first.pipeline.rolled_back.len(), 1);
        assert_eq!(first.outcomes_fed, 1);
        assert_eq!(first.pipeline.schedule.interval, Duration::from_secs(120));
        assert_eq!(target.area_json("ingest").unwrap()["max_batch_size"], json!(100));

        for observation in spikes(20) {
            opt.observe(observation).unwrap();
        }
        let second = opt.run_cycle(&context).await;
        assert_eq!(second.opportunities, 1);
        assert!(second.pipeline.deployed.is_empty());
        assert_eq!(second.pipeline.rejected, 1);

        let snapshot: LearnerSnapshot = storage
            .load_json(Bucket::Learner, SNAPSHOT_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.cycles, 2);
    }

    #[tokio::test]
    async fn test_init_restores_learner_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let opt = optimizer(ingest_target(), storage.clone()).await;
            opt.observe(Observation::latency(40.0)).unwrap();
            opt.run_cycle(&opt.default_context()).await;
        }

        let restored = optimizer(ingest_target(), storage).await;
        let status = restored.status().await;
        assert_eq!(status.learner_cycles, 1);
        assert_eq!(status.experiences, 1);
    }

    #[tokio::test]
    async fn test_init_ignores_corrupt_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        storage.save(Bucket::Learner, SNAPSHOT_KEY, b"not json").await.unwrap();
        let opt = optimizer(ingest_target(), storage).await;
        assert_eq!(opt.status().await.learner_cycles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_task_runs_on_schedule_and_stops() {
        let storage = Arc::new(MemoryStorage::new());
        let mut opt = optimizer(ingest_target(), storage.clone()).await;
        opt.spawn(opt.default_context()).unwrap();
        assert!(matches!(opt.spawn(opt.default_context()), Err(RuntimeError::AlreadyRunning)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(opt.status().await.learner_cycles, 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(opt.status().await.learner_cycles, 1);

        opt.shutdown().await.unwrap();
        assert!(!opt.status().await.background);
        assert_eq!(storage.count(Bucket::Learner).await, 1);
    }
}
