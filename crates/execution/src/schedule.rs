//! Iterate phase: next-cycle scheduling and per-area weighting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use venturi_core::PipelineConfig;

/// Interval used when the configured one is unusable.
const FALLBACK_INTERVAL: Duration = Duration::from_secs(60);

/// Area weight multiplier after a rollback or failed deploy.
const REGRESSION_WEIGHT: f64 = 0.5;
/// Area weight multiplier after a kept change.
const RECOVERY_WEIGHT: f64 = 1.25;
/// Lowest weight an area can sink to.
const MIN_AREA_WEIGHT: f64 = 0.1;

/// When and how the next cycle should run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextCycleSchedule {
    /// Delay before the next cycle
    pub interval: Duration,
    /// Rank multipliers for areas that are not at full weight
    pub area_weights: BTreeMap<String, f64>,
    /// Why this schedule was chosen
    pub reason: String,
}

/// Scheduling errors.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The configured intervals cannot produce a schedule
    #[error("invalid cycle interval: base {base:?}, max {max:?}")]
    InvalidInterval {
        /// Configured base interval
        base: Duration,
        /// Configured maximum interval
        max: Duration,
    },
}

/// Backs the cycle interval off after regressions and restores it after a
/// clean run.
#[derive(Debug, Clone)]
pub struct CycleScheduler {
    base: Duration,
    max: Duration,
    current: Duration,
    area_weights: BTreeMap<String, f64>,
}

impl CycleScheduler {
    /// Scheduler using the configured intervals.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let base = config.cycle_interval();
        Self {
            base,
            max: config.max_cycle_interval(),
            current: base,
            area_weights: BTreeMap::new(),
        }
    }

    /// Compute the next schedule from this run's results.
    pub fn next(&mut self, regressed: &[String], kept: &[String]) -> Result<NextCycleSchedule, ScheduleError> {
        if self.base.is_zero() || self.max < self.base {
            return Err(ScheduleError::InvalidInterval {
                base: self.base,
                max: self.max,
            });
        }

        for area in regressed {
            let weight = self.area_weights.entry(area.clone()).or_insert(1.0);
            *weight = (*weight * REGRESSION_WEIGHT).max(MIN_AREA_WEIGHT);
        }
        for area in kept {
            if let Some(weight) = self.area_weights.get_mut(area) {
                *weight *= RECOVERY_WEIGHT;
            }
        }
        self.area_weights.retain(|_, w| *w < 1.0);

        let reason = if regressed.is_empty() {
            self.current = self.base;
            "clean run".to_string()
        } else {
            self.current = self.current.saturating_mul(2).min(self.max);
            format!("{} regression(s), backing off", regressed.len())
        };

        Ok(NextCycleSchedule {
            interval: self.current,
            area_weights: self.area_weights.clone(),
            reason,
        })
    }

    /// Schedule used when [`next`](Self::next) fails.
    pub fn fallback(&mut self) -> NextCycleSchedule {
        self.current = if self.base.is_zero() { FALLBACK_INTERVAL } else { self.base };
        self.area_weights.clear();
        NextCycleSchedule {
            interval: self.current,
            area_weights: BTreeMap::new(),
            reason: "default schedule".to_string(),
        }
    }

    /// Schedule before any run has completed.
    pub fn initial(&self) -> NextCycleSchedule {
        NextCycleSchedule {
            interval: if self.base.is_zero() { FALLBACK_INTERVAL } else { self.base },
            area_weights: BTreeMap::new(),
            reason: "initial".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> CycleScheduler {
        CycleScheduler::from_config(&PipelineConfig {
            cycle_interval_seconds: 60,
            max_cycle_interval_seconds: 200,
            ..Default::default()
        })
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut s = scheduler();
        let hot = vec!["ingest".to_string()];
        assert_eq!(s.next(&hot, &[]).unwrap().interval, Duration::from_secs(120));
        assert_eq!(s.next(&hot, &[]).unwrap().interval, Duration::from_secs(200));
        assert_eq!(s.next(&hot, &[]).unwrap().interval, Duration::from_secs(200));
        assert_eq!(s.next(&[], &[]).unwrap().interval, Duration::from_secs(60));
    }

    #[test]
    fn test_area_weights_drop_and_recover() {
        let mut s = scheduler();
        let area = vec!["ingest".to_string()];
        let schedule = s.next(&area, &[]).unwrap();
        assert_eq!(schedule.area_weights["ingest"], 0.5);

        let schedule = s.next(&[], &area).unwrap();
        assert_eq!(schedule.area_weights["ingest"], 0.625);

        s.next(&[], &area).unwrap();
        s.next(&[], &area).unwrap();
        let schedule = s.next(&[], &area).unwrap();
        assert!(schedule.area_weights.is_empty());
    }

    #[test]
    fn test_invalid_interval_errors_and_falls_back() {
        let mut s = CycleScheduler::from_config(&PipelineConfig {
            cycle_interval_seconds: 0,
            ..Default::default()
        });
        assert!(s.next(&[], &[]).is_err());
        assert_eq!(s.fallback().interval, FALLBACK_INTERVAL);
    }
}
