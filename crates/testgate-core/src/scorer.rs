//! Score and verdict reductions.
//!
//! The gate score weights each check by severity (critical 3.0, warning 1.0,
//! info 0.5); a passing check contributes 100 and a failing one 0. The
//! verdict is independent of the score: a run passes when no check failed
//! critically, however low the score.

use crate::domain::{GateSummary, ResourceUsage, TestCounts, TestPlanResult, ValidationResult};

/// Weighted quality score in `0.0..=100.0`; `0.0` for no results.
pub fn score(results: &[ValidationResult]) -> f64 {
    let (weighted, total_weight) = results.iter().fold((0.0_f64, 0.0_f64), |(sum, weights), r| {
        let weight = r.severity.weight();
        let contribution = if r.passed { 100.0 } else { 0.0 };
        (sum + contribution * weight, weights + weight)
    });

    if total_weight > 0.0 {
        (weighted / total_weight).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// `true` when no result is a critical failure.
pub fn overall_success(results: &[ValidationResult]) -> bool {
    !results.iter().any(ValidationResult::is_critical_failure)
}

/// Counts, score and verdict for a set of gate checks.
pub fn summarize(results: &[ValidationResult]) -> GateSummary {
    GateSummary {
        total_checks: results.len(),
        passed: results.iter().filter(|r| r.passed).count(),
        critical_failures: results.iter().filter(|r| r.is_critical_failure()).count(),
        warnings: results.iter().filter(|r| r.is_warning()).count(),
        quality_score: score(results),
        overall_passed: overall_success(results),
    }
}

/// Quality score of a single plan execution.
///
/// Unsuccessful plans score 0. Otherwise: 50 base, up to 30 for coverage
/// (full marks at 90 %), up to 15 for test success rate, up to 5 for low
/// memory use. Capped at 100.
pub fn plan_quality_score(
    success: bool,
    coverage: f64,
    counts: &TestCounts,
    resources: &ResourceUsage,
) -> f64 {
    if !success {
        return 0.0;
    }

    let coverage_points = (coverage / 90.0 * 30.0).clamp(0.0, 30.0);
    let success_points = counts.success_rate() * 15.0;
    let memory_points = (5.0 - resources.memory_mb / 100.0).clamp(0.0, 5.0);

    (50.0 + coverage_points + success_points + memory_points).min(100.0)
}

/// Test-count-weighted mean of plan coverage; `0.0` when no tests ran.
pub fn weighted_coverage(plans: &[TestPlanResult]) -> f64 {
    let total_tests: u64 = plans.iter().map(|p| p.test_count).sum();
    if total_tests == 0 {
        return 0.0;
    }
    let weighted: f64 = plans
        .iter()
        .map(|p| p.coverage_percentage * p.test_count as f64)
        .sum();
    weighted / total_tests as f64
}

/// Arithmetic mean of plan quality scores; `0.0` for no plans.
pub fn mean_quality_score(plans: &[TestPlanResult]) -> f64 {
    if plans.is_empty() {
        return 0.0;
    }
    plans.iter().map(|p| p.quality_score).sum::<f64>() / plans.len() as f64
}
