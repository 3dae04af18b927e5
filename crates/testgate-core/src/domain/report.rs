//! Aggregate validation report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{TestPlanResult, ValidationResult};

/// Summary of gate check outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSummary {
    pub total_checks: usize,
    pub passed: usize,
    pub critical_failures: usize,
    pub warnings: usize,

    /// Weighted gate score, 0–100.
    pub quality_score: f64,

    /// No critical failures.
    pub overall_passed: bool,
}

/// The single output of an orchestration run.
///
/// Field names are the report JSON schema consumed by renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub run_id: Uuid,
    pub overall_success: bool,
    pub total_execution_time: f64,
    pub total_tests: u64,
    pub total_passed: u64,
    pub total_failed: u64,
    pub overall_coverage: f64,
    pub overall_quality_score: f64,

    /// One entry per requested plan, in request order.
    pub test_plan_results: Vec<TestPlanResult>,

    pub quality_gate_results: GateSummary,
    pub gate_checks: Vec<ValidationResult>,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ValidationReport {
    /// Process exit code for the hosting CLI.
    pub fn exit_code(&self) -> i32 {
        if self.overall_success {
            0
        } else {
            1
        }
    }

    pub fn failed_plans(&self) -> impl Iterator<Item = &TestPlanResult> {
        self.test_plan_results.iter().filter(|p| !p.success)
    }

    pub fn critical_failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.gate_checks.iter().filter(|c| c.is_critical_failure())
    }
}
