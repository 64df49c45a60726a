//! Exponentially weighted moving average over a scalar stream.

use crate::ControlError;
use serde::{Deserialize, Serialize};

/// Current EWMA value together with its smoothing weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedSignal {
    /// Smoothed value
    pub value: f64,
    /// Weight of the newest sample
    pub weight: f64,
}

/// EWMA smoother: `smoothed = α·x + (1-α)·smoothed_prev`.
///
/// The first accepted sample seeds the average. Non-finite samples are
/// rejected and leave the average untouched.
#[derive(Debug, Clone)]
pub struct SignalSmoother {
    weight: f64,
    value: Option<f64>,
    samples: u64,
}

impl SignalSmoother {
    /// Create a smoother with weight `α`, clamped into `(0, 1]`.
    pub fn new(weight: f64) -> Self {
        let weight = if weight.is_finite() && weight > 0.0 {
            weight.min(1.0)
        } else {
            venturi_core::config::smoothing_weight_for_window(10)
        };
        Self {
            weight,
            value: None,
            samples: 0,
        }
    }

    /// Create a smoother equivalent to an N-sample averaging window.
    pub fn with_window(samples: usize) -> Self {
        Self::new(venturi_core::config::smoothing_weight_for_window(samples))
    }

    /// Feed one observation and return the updated average.
    pub fn update(&mut self, observation: f64) -> Result<f64, ControlError> {
        if !observation.is_finite() {
            return Err(ControlError::InvalidObservation { value: observation });
        }
        let next = match self.value {
            Some(prev) => self.weight * observation + (1.0 - self.weight) * prev,
            None => observation,
        };
        self.value = Some(next);
        self.samples += 1;
        Ok(next)
    }

    /// Current average, if any sample has been accepted.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Current signal, if any sample has been accepted.
    pub fn signal(&self) -> Option<SmoothedSignal> {
        self.value.map(|value| SmoothedSignal {
            value,
            weight: self.weight,
        })
    }

    /// Configured weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Number of accepted samples.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Forget the running average.
    pub fn reset(&mut self) {
        self.value = None;
        self.samples = 0;
    }
}

impl Default for SignalSmoother {
    fn default() -> Self {
        Self::with_window(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_seeds_average() {
        let mut s = SignalSmoother::new(0.5);
        assert_eq!(s.update(10.0).unwrap(), 10.0);
        assert_eq!(s.update(20.0).unwrap(), 15.0);
        assert_eq!(s.update(15.0).unwrap(), 15.0);
        assert_eq!(s.samples(), 3);
    }

    #[test]
    fn test_non_finite_is_rejected_and_ignored() {
        let mut s = SignalSmoother::new(0.5);
        s.update(10.0).unwrap();
        assert!(matches!(s.update(f64::NAN), Err(ControlError::InvalidObservation { .. })));
        assert!(s.update(f64::INFINITY).is_err());
        assert_eq!(s.value(), Some(10.0));
        assert_eq!(s.samples(), 1);
    }

    #[test]
    fn test_deterministic_for_same_sequence() {
        let seq = [3.0, 9.0, 4.5, 100.0, 0.0, 7.25];
        let mut a = SignalSmoother::default();
        let mut b = SignalSmoother::default();
        for x in seq {
            a.update(x).unwrap();
            b.update(x).unwrap();
        }
        assert_eq!(a.value(), b.value());
    }

    #[test]
    fn test_invalid_weight_falls_back_to_default() {
        let s = SignalSmoother::new(f64::NAN);
        assert!((s.weight() - 2.0 / 11.0).abs() < 1e-12);
        assert_eq!(SignalSmoother::new(3.0).weight(), 1.0);
    }

    #[test]
    fn test_signal_reports_weight() {
        let mut s = SignalSmoother::new(0.25);
        assert!(s.signal().is_none());
        s.update(4.0).unwrap();
        let signal = s.signal().unwrap();
        assert_eq!(signal.value, 4.0);
        assert_eq!(signal.weight, 0.25);
    }
}
