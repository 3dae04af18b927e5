//! Check and plan outcome records.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::PlanState;

/// Classification of a single check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Severity is derived from threshold criticality and the check outcome;
    /// a passing check is always `Info`.
    pub fn classify(critical: bool, passed: bool) -> Self {
        match (passed, critical) {
            (true, _) => Severity::Info,
            (false, true) => Severity::Critical,
            (false, false) => Severity::Warning,
        }
    }

    /// Scoring weight.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 3.0,
            Severity::Warning => 1.0,
            Severity::Info => 0.5,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Outcome of comparing one metric with one threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Display label of the threshold that was checked.
    pub check_name: String,

    /// Registry key of the threshold.
    pub threshold_key: String,

    pub passed: bool,
    pub actual_value: f64,
    pub threshold_value: f64,
    pub message: String,
    pub severity: Severity,
}

impl ValidationResult {
    /// A failed check that blocks deployment.
    pub fn is_critical_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Critical
    }

    pub fn is_warning(&self) -> bool {
        !self.passed && self.severity == Severity::Warning
    }
}

/// Result of executing one test plan.
///
/// Exactly one exists per requested plan. Plans that could not run are
/// represented by a synthesized record (see [`TestPlanResult::synthesized`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPlanResult {
    pub test_plan: String,

    /// Terminal execution state.
    pub state: PlanState,

    pub success: bool,
    pub execution_time_seconds: f64,
    pub coverage_percentage: f64,
    pub test_count: u64,
    pub passed_count: u64,
    pub failed_count: u64,
    pub skipped_count: u64,
    pub memory_usage_mb: f64,
    pub cpu_usage_percentage: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,

    /// 0–100.
    pub quality_score: f64,
}

impl TestPlanResult {
    /// Failure record for a plan that crashed, timed out, or never built.
    ///
    /// All counts and metrics are zero; only the error is recorded.
    pub fn synthesized(
        plan_id: &str,
        state: PlanState,
        execution_time_seconds: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            test_plan: plan_id.to_string(),
            state,
            success: false,
            execution_time_seconds,
            coverage_percentage: 0.0,
            test_count: 0,
            passed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            memory_usage_mb: 0.0,
            cpu_usage_percentage: 0.0,
            errors: vec![error.into()],
            warnings: Vec::new(),
            quality_score: 0.0,
        }
    }
}
