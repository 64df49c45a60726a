//! Error taxonomy shared across the optimizer.
//!
//! None of these are fatal to the host process; each names how it is
//! recovered.

use crate::id::CandidateId;

/// Optimizer-level failure categories.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizerError {
    /// Non-finite or out-of-range input; ignored locally.
    #[error("invalid observation: {0}")]
    InvalidObservation(String),

    /// A learner or pipeline stage could not proceed; retried next cycle.
    #[error("cycle skipped: {0}")]
    CycleSkipped(String),

    /// Candidate failed the confidence/risk/complexity gate; recorded, not surfaced.
    #[error("candidate {candidate} rejected: {reasons:?}")]
    ValidationRejected {
        /// Rejected candidate
        candidate: CandidateId,
        /// Every violated threshold
        reasons: Vec<String>,
    },

    /// Deploy step errored; recovered by immediate rollback.
    #[error("deploy of candidate {candidate} failed: {reason}")]
    DeployFailed {
        /// Candidate being deployed
        candidate: CandidateId,
        /// What went wrong
        reason: String,
    },

    /// Monitored effectiveness was too low; recovered by rollback.
    #[error("effectiveness {measured:.3} below threshold {threshold:.3}")]
    EffectivenessBelowThreshold {
        /// Measured effectiveness
        measured: f64,
        /// Configured threshold
        threshold: f64,
    },

    /// Monitored error rate was too high; recovered by rollback.
    #[error("error rate {measured:.3} exceeds threshold {threshold:.3}")]
    ErrorRateExceeded {
        /// Measured error rate
        measured: f64,
        /// Configured threshold
        threshold: f64,
    },

    /// Target adapter unreachable; fatal for the current step only.
    #[error("target adapter unavailable: {0}")]
    AdapterUnavailable(String),
}

/// Result alias for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = OptimizerError::EffectivenessBelowThreshold {
            measured: 0.3,
            threshold: 0.5,
        };
        assert_eq!(err.to_string(), "effectiveness 0.300 below threshold 0.500");

        let err = OptimizerError::AdapterUnavailable("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}
