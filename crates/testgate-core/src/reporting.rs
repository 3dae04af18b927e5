//! Report assembly and report artifacts.
//!
//! [`ReportBuilder`] turns the ordered plan results and gate checks of one run
//! into a [`ValidationReport`]. Recommendation rules run in a fixed order, so
//! the same inputs always yield the same text.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{GateError, Result, TestPlanResult, ValidationReport, ValidationResult};
use crate::scorer;

/// Coverage below which a plan gets an "improve coverage" recommendation.
pub const DEFAULT_COVERAGE_FLOOR: f64 = 80.0;

/// Plan duration (seconds) above which a plan gets an "optimize" recommendation.
pub const DEFAULT_SLOW_PLAN_SECS: f64 = 300.0;

/// Builds the aggregate report of a run.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    pub coverage_floor: f64,
    pub slow_plan_secs: f64,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self {
            coverage_floor: DEFAULT_COVERAGE_FLOOR,
            slow_plan_secs: DEFAULT_SLOW_PLAN_SECS,
        }
    }
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble the report.
    ///
    /// `plans` must already be in request order; it is stored as given.
    pub fn build(
        &self,
        run_id: Uuid,
        plans: Vec<TestPlanResult>,
        gate_checks: Vec<ValidationResult>,
        total_execution_time: f64,
        timestamp: DateTime<Utc>,
    ) -> ValidationReport {
        let gate_summary = scorer::summarize(&gate_checks);
        let overall_success = plans.iter().all(|p| p.success) && gate_summary.overall_passed;

        let recommendations = self.recommendations(&plans, &gate_checks);
        let next_steps = next_steps(overall_success);

        ValidationReport {
            run_id,
            overall_success,
            total_execution_time,
            total_tests: plans.iter().map(|p| p.test_count).sum(),
            total_passed: plans.iter().map(|p| p.passed_count).sum(),
            total_failed: plans.iter().map(|p| p.failed_count).sum(),
            overall_coverage: scorer::weighted_coverage(&plans),
            overall_quality_score: scorer::mean_quality_score(&plans),
            test_plan_results: plans,
            quality_gate_results: gate_summary,
            gate_checks,
            recommendations,
            next_steps,
            timestamp,
        }
    }

    /// Recommendation lines, in rule order: failing plans, low coverage,
    /// slow plans, critical gate failures (with per-check detail), warnings.
    pub fn recommendations(
        &self,
        plans: &[TestPlanResult],
        gate_checks: &[ValidationResult],
    ) -> Vec<String> {
        let mut out = Vec::new();

        let failed = plan_names(plans.iter().filter(|p| !p.success));
        if !failed.is_empty() {
            out.push(format!("Fix failing test plans: {failed}"));
        }

        let low_coverage = plan_names(
            plans
                .iter()
                .filter(|p| p.coverage_percentage < self.coverage_floor),
        );
        if !low_coverage.is_empty() {
            out.push(format!("Improve test coverage for: {low_coverage}"));
        }

        let slow = plan_names(
            plans
                .iter()
                .filter(|p| p.execution_time_seconds > self.slow_plan_secs),
        );
        if !slow.is_empty() {
            out.push(format!("Optimize performance for slow test plans: {slow}"));
        }

        let critical: Vec<&ValidationResult> = gate_checks
            .iter()
            .filter(|c| c.is_critical_failure())
            .collect();
        if !critical.is_empty() {
            out.push("Address critical quality gate failures before deployment".to_string());
            for failure in critical {
                let key = failure.threshold_key.as_str();
                if key.contains("coverage") {
                    out.push(format!("Increase test coverage for {}", failure.check_name));
                } else if key.contains("vulnerabilit") {
                    out.push(format!("Resolve security vulnerabilities: {}", failure.message));
                } else if key.contains("performance") || key.contains("time") {
                    out.push(format!("Optimize performance: {}", failure.message));
                }
            }
        }

        let warnings = gate_checks.iter().filter(|c| c.is_warning()).count();
        if warnings > 0 {
            out.push(format!("Address {warnings} warning(s) to improve quality score"));
        }

        if out.is_empty() {
            out.push("All validation checks passed - ready for deployment".to_string());
        }
        out
    }
}

fn plan_names<'a>(plans: impl Iterator<Item = &'a TestPlanResult>) -> String {
    plans
        .map(|p| p.test_plan.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fixed next-step checklist for a passing or failing run.
pub fn next_steps(overall_success: bool) -> Vec<String> {
    let steps: [&str; 4] = if overall_success {
        [
            "All validation checks passed",
            "Ready for deployment",
            "Begin staged rollout",
            "Monitor production metrics",
        ]
    } else {
        [
            "Fix failing validation checks",
            "Re-run comprehensive validation",
            "Address quality gate failures",
            "Retry deployment after fixes",
        ]
    };
    steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect()
}

/// Plain-text summary for terminals.
pub fn render_summary(report: &ValidationReport) -> String {
    let mut out = String::new();
    let status = if report.overall_success { "PASSED" } else { "FAILED" };

    let _ = writeln!(out, "Validation report {}", report.run_id);
    let _ = writeln!(out, "Overall status: {status}");
    if !report.overall_success {
        let _ = writeln!(
            out,
            "Blocked by: {} failed plan(s), {} critical gate failure(s)",
            report.failed_plans().count(),
            report.critical_failures().count()
        );
    }
    let _ = writeln!(out, "Quality score: {:.1}/100", report.overall_quality_score);
    let _ = writeln!(
        out,
        "Gate score: {:.1}/100 ({} checks, {} critical failures, {} warnings)",
        report.quality_gate_results.quality_score,
        report.quality_gate_results.total_checks,
        report.quality_gate_results.critical_failures,
        report.quality_gate_results.warnings,
    );
    let _ = writeln!(out, "Total execution time: {:.1}s", report.total_execution_time);
    let _ = writeln!(
        out,
        "Tests: {} total, {} passed, {} failed",
        report.total_tests, report.total_passed, report.total_failed
    );
    let _ = writeln!(out, "Overall coverage: {:.1}%", report.overall_coverage);

    out.push_str("\nTest plans:\n");
    for plan in &report.test_plan_results {
        let mark = if plan.success { "✓" } else { "✗" };
        let _ = writeln!(
            out,
            "  {mark} {} [{}]: {:.1}/100 ({:.1}s)",
            plan.test_plan, plan.state, plan.quality_score, plan.execution_time_seconds
        );
        for error in &plan.errors {
            let _ = writeln!(out, "      - {error}");
        }
    }

    out.push_str("\nQuality gates:\n");
    for check in &report.gate_checks {
        let mark = if check.passed { "✓" } else { "✗" };
        let _ = writeln!(out, "  {mark} [{}] {}", check.severity, check.message);
    }

    out.push_str("\nRecommendations:\n");
    for (i, rec) in report.recommendations.iter().enumerate() {
        let _ = writeln!(out, "  {}. {rec}", i + 1);
    }

    out.push_str("\nNext steps:\n");
    for step in &report.next_steps {
        let _ = writeln!(out, "  {step}");
    }
    out
}

fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write the report as pretty JSON to `path`.
pub fn write_report_json(path: &Path, report: &ValidationReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Persist `<dir>/<run_id>/report.json` and `<dir>/<run_id>/report.digest`.
pub fn write_report_artifact(report: &ValidationReport, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(report.run_id.to_string());
    std::fs::create_dir_all(&run_dir)?;

    let path = run_dir.join("report.json");
    let json = serde_json::to_vec_pretty(report)?;
    std::fs::write(&path, &json)?;
    std::fs::write(run_dir.join("report.digest"), digest_hex(&json))?;

    Ok(path)
}

/// Read `<dir>/<run_id>/report.json`, verifying it against its digest.
pub fn read_report_artifact(run_id: &Uuid, dir: &Path) -> Result<ValidationReport> {
    let run_dir = dir.join(run_id.to_string());
    let json = std::fs::read(run_dir.join("report.json"))?;
    let expected = std::fs::read_to_string(run_dir.join("report.digest"))?;

    let actual = digest_hex(&json);
    if expected.trim() != actual {
        return Err(GateError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}
