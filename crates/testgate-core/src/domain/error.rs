//! Domain-level error taxonomy for testgate.

use crate::domain::state::PlanState;

/// testgate domain errors.
///
/// `Config` is fatal and surfaces before any plan runs. `Execution` and
/// `Timeout` are produced at the executor boundary and are converted into
/// failed plan results by the orchestrator; they never escape a run.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("execution error in plan {plan_id}: {reason}")]
    Execution { plan_id: String, reason: String },

    #[error("plan {plan_id} timed out after {seconds}s")]
    Timeout { plan_id: String, seconds: u64 },

    #[error("illegal plan state transition: {from} -> {to}")]
    InvalidTransition { from: PlanState, to: PlanState },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Shorthand for an unknown-threshold configuration error.
    pub fn unknown_threshold(name: &str) -> Self {
        Self::Config(format!("unknown threshold: {name}"))
    }

    /// Whether this error represents a timeout rather than a hard failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for testgate domain operations.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_error_display() {
        let err = GateError::unknown_threshold("coverage_of_everything");
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("coverage_of_everything"));

        let err = GateError::Execution {
            plan_id: "UnitTestPlan".to_string(),
            reason: "exit code 65".to_string(),
        };
        assert!(err.to_string().contains("UnitTestPlan"));
        assert!(err.to_string().contains("exit code 65"));
    }

    #[test]
    fn test_timeout_is_distinguishable() {
        let err = GateError::Timeout {
            plan_id: "PerformanceTestPlan".to_string(),
            seconds: 1800,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("1800s"));

        assert!(!GateError::Config("bad".to_string()).is_timeout());
    }

    #[test]
    fn test_invalid_transition_names_both_states() {
        let err = GateError::InvalidTransition {
            from: PlanState::Pending,
            to: PlanState::Validated,
        };
        let msg = err.to_string();
        assert!(msg.contains("pending"));
        assert!(msg.contains("validated"));
    }
}
