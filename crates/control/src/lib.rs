//! Fast-path batch control.
//!
//! A latency EWMA drives an aggressiveness coefficient and batch-size bound.
//! Everything here is synchronous and allocation-free per tick so it can run
//! inline on every observation.

#![warn(missing_docs, unused_crate_dependencies)]

mod smoother;
mod controller;
mod shared;

pub use smoother::{SignalSmoother, SmoothedSignal};
pub use controller::{
    batch_bound_for, recovery_steps, AdaptiveBatchController, Adjustment, ControllerState,
};
pub use shared::SharedController;

use venturi_core::OptimizerError;

/// Errors raised by the fast path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    /// Observation was non-finite or negative and was ignored
    #[error("invalid observation: {value}")]
    InvalidObservation {
        /// The rejected value
        value: f64,
    },
}

impl From<ControlError> for OptimizerError {
    fn from(err: ControlError) -> Self {
        OptimizerError::InvalidObservation(err.to_string())
    }
}
