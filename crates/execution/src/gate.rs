//! Validate phase: the strict acceptance gate.

use venturi_core::{CandidateOptimization, OptimizerError, PipelineConfig};

/// Gate verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// All three checks passed
    Accept,
    /// At least one check failed; one reason per failed check
    Reject(Vec<String>),
}

impl GateDecision {
    /// Whether the candidate may be deployed.
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept)
    }
}

/// Accepts iff `confidence > c AND risk < r AND complexity < x`, with each
/// score inside its range (`[0, 1]` for confidence, `[0, 10]` otherwise).
///
/// Comparisons are strict and exact; NaN fails every check.
#[derive(Debug, Clone, Copy)]
pub struct ValidationGate {
    confidence_threshold: f64,
    risk_threshold: f64,
    complexity_threshold: f64,
}

impl ValidationGate {
    /// Gate with the configured thresholds.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            risk_threshold: config.risk_threshold,
            complexity_threshold: config.complexity_threshold,
        }
    }

    /// Evaluate one candidate.
    pub fn evaluate(&self, candidate: &CandidateOptimization) -> GateDecision {
        let mut reasons = Vec::new();
        if !(candidate.confidence > self.confidence_threshold) {
            reasons.push(format!(
                "confidence {} is not above {}",
                candidate.confidence, self.confidence_threshold
            ));
        }
        if !(candidate.risk_score < self.risk_threshold) {
            reasons.push(format!(
                "risk {} is not below {}",
                candidate.risk_score, self.risk_threshold
            ));
        }
        if !(candidate.complexity_score < self.complexity_threshold) {
            reasons.push(format!(
                "complexity {} is not below {}",
                candidate.complexity_score, self.complexity_threshold
            ));
        }
        out_of_range("confidence", candidate.confidence, 1.0, &mut reasons);
        out_of_range("risk", candidate.risk_score, 10.0, &mut reasons);
        out_of_range("complexity", candidate.complexity_score, 10.0, &mut reasons);
        if reasons.is_empty() {
            GateDecision::Accept
        } else {
            GateDecision::Reject(reasons)
        }
    }

    /// Like [`evaluate`](Self::evaluate), as a `Result`.
    pub fn check(&self, candidate: &CandidateOptimization) -> venturi_core::Result<()> {
        match self.evaluate(candidate) {
            GateDecision::Accept => Ok(()),
            GateDecision::Reject(reasons) => Err(OptimizerError::ValidationRejected {
                candidate: candidate.id,
                reasons,
            }),
        }
    }
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

// NaN is already reported by the threshold checks.
fn out_of_range(name: &str, value: f64, max: f64, reasons: &mut Vec<String>) {
    if !value.is_nan() && !(0.0..=max).contains(&value) {
        reasons.push(format!("{} {} is outside [0, {}]", name, value, max));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(confidence: f64, risk: f64, complexity: f64) -> CandidateOptimization {
        CandidateOptimization::new("a", "d", confidence, risk, complexity, serde_json::json!({}))
    }

    fn rejections(decision: GateDecision) -> usize {
        match decision {
            GateDecision::Accept => 0,
            GateDecision::Reject(reasons) => reasons.len(),
        }
    }

    #[test]
    fn test_boundaries_are_strict() {
        let gate = ValidationGate::default();
        assert!(!gate.evaluate(&candidate(0.85, 1.0, 1.0)).is_accept());
        assert!(!gate.evaluate(&candidate(0.9, 5.0, 1.0)).is_accept());
        assert!(!gate.evaluate(&candidate(0.9, 1.0, 8.0)).is_accept());
        assert!(gate.evaluate(&candidate(0.851, 4.9, 7.9)).is_accept());
    }

    #[test]
    fn test_each_violation_is_reported() {
        let gate = ValidationGate::default();
        assert_eq!(rejections(gate.evaluate(&candidate(0.5, 1.0, 1.0))), 1);
        assert_eq!(rejections(gate.evaluate(&candidate(0.5, 6.0, 9.0))), 3);
    }

    #[test]
    fn test_nan_is_rejected() {
        let gate = ValidationGate::default();
        assert_eq!(rejections(gate.evaluate(&candidate(f64::NAN, f64::NAN, f64::NAN))), 3);
    }

    #[test]
    fn test_out_of_range_scores_are_rejected() {
        let gate = ValidationGate::default();

        let decision = gate.evaluate(&candidate(1.7, 1.0, 1.0));
        assert_eq!(
            decision,
            GateDecision::Reject(vec!["confidence 1.7 is outside [0, 1]".to_string()])
        );
        assert_eq!(rejections(gate.evaluate(&candidate(0.9, -1.0, 1.0))), 1);
        assert_eq!(rejections(gate.evaluate(&candidate(0.9, 1.0, -0.5))), 1);
        assert!(gate.evaluate(&candidate(1.0, 0.0, 0.0)).is_accept());
    }

    #[test]
    fn test_check_carries_reasons() {
        let gate = ValidationGate::default();
        let c = candidate(0.5, 6.0, 1.0);
        match gate.check(&c) {
            Err(OptimizerError::ValidationRejected { candidate, reasons }) => {
                assert_eq!(candidate, c.id);
                assert_eq!(reasons.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(gate.check(&candidate(0.9, 1.0, 1.0)).is_ok());
    }

    #[test]
    fn test_custom_thresholds() {
        let gate = ValidationGate::from_config(&PipelineConfig {
            confidence_threshold: 0.5,
            ..Default::default()
        });
        assert!(gate.evaluate(&candidate(0.6, 1.0, 1.0)).is_accept());
    }
}
