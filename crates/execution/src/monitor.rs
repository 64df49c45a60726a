//! Monitor phase: watch a deployed area until keep or rollback.

use crate::adapter::TargetAdapter;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;
use venturi_core::{OptimizerError, PipelineConfig, RollbackTrigger};

/// How a monitored deployment ends.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorVerdict {
    /// Figures stayed within thresholds for the whole window
    Keep {
        /// Mean effectiveness over conclusive samples
        effectiveness: f64,
        /// Mean error rate over conclusive samples
        error_rate: f64,
    },
    /// The change must be reverted
    Rollback {
        /// What triggered it
        trigger: RollbackTrigger,
        /// Human-readable reason
        reason: String,
        /// Last measured effectiveness, if any
        effectiveness: Option<f64>,
        /// Last measured error rate, if any
        error_rate: Option<f64>,
    },
    /// The adapter could not be reached; try again next run
    Unavailable(String),
}

/// Number of monitor windows before an inconclusive deployment is reverted.
const MAX_WINDOWS: u32 = 2;

/// Polls `health_check` over the monitor window.
///
/// A breach on any conclusive sample rolls back at once. A window that ends
/// with too few conclusive samples is extended once, then rolled back.
pub struct Monitor<'a> {
    adapter: &'a dyn TargetAdapter,
    window: Duration,
    poll_interval: Duration,
    min_samples: u64,
    effectiveness_threshold: f64,
    error_rate_threshold: f64,
}

impl<'a> Monitor<'a> {
    /// Create a monitor with the configured window and thresholds.
    pub fn new(adapter: &'a dyn TargetAdapter, config: &PipelineConfig) -> Self {
        Self {
            adapter,
            window: config.monitor_window(),
            poll_interval: config.monitor_poll_interval().max(Duration::from_millis(1)),
            min_samples: config.min_monitor_samples,
            effectiveness_threshold: config.effectiveness_threshold,
            error_rate_threshold: config.error_rate_threshold,
        }
    }

    /// Watch one area.
    pub async fn watch(&self, area: &str) -> MonitorVerdict {
        let mut effectiveness_sum = 0.0;
        let mut error_rate_sum = 0.0;
        let mut polls = 0u32;
        let mut samples = 0u64;

        for window in 1..=MAX_WINDOWS {
            let deadline = Instant::now() + self.window;
            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                sleep(self.poll_interval.min(deadline - now)).await;

                let health = match self.adapter.health_check(area).await {
                    Ok(health) => health,
                    Err(e) if e.is_unavailable() => return MonitorVerdict::Unavailable(e.to_string()),
                    Err(e) => {
                        debug!("Unreadable health for {}: {}", area, e);
                        continue;
                    }
                };
                if !health.is_conclusive(1) {
                    continue;
                }
                let (Some(effectiveness), Some(error_rate)) = (health.effectiveness, health.error_rate) else {
                    continue;
                };

                if effectiveness < self.effectiveness_threshold {
                    return MonitorVerdict::Rollback {
                        trigger: RollbackTrigger::LowEffectiveness,
                        reason: OptimizerError::EffectivenessBelowThreshold {
                            measured: effectiveness,
                            threshold: self.effectiveness_threshold,
                        }
                        .to_string(),
                        effectiveness: Some(effectiveness),
                        error_rate: Some(error_rate),
                    };
                }
                if error_rate > self.error_rate_threshold {
                    return MonitorVerdict::Rollback {
                        trigger: RollbackTrigger::HighErrorRate,
                        reason: OptimizerError::ErrorRateExceeded {
                            measured: error_rate,
                            threshold: self.error_rate_threshold,
                        }
                        .to_string(),
                        effectiveness: Some(effectiveness),
                        error_rate: Some(error_rate),
                    };
                }
                effectiveness_sum += effectiveness;
                error_rate_sum += error_rate;
                polls += 1;
                samples += health.samples;
            }

            if polls > 0 && samples >= self.min_samples {
                return MonitorVerdict::Keep {
                    effectiveness: effectiveness_sum / f64::from(polls),
                    error_rate: error_rate_sum / f64::from(polls),
                };
            }
            debug!("Monitor window {} for {} inconclusive", window, area);
        }

        MonitorVerdict::Rollback {
            trigger: RollbackTrigger::InconclusiveMonitoring,
            reason: format!("no conclusive health data for '{}' after extended window", area),
            effectiveness: None,
            error_rate: None,
        }
    }
}
