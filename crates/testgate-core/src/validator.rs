//! Threshold validation.
//!
//! [`validate`] compares one metric with one threshold. [`Validator`] groups
//! those comparisons into the gate check families (coverage, performance,
//! security, reliability, integration) over a [`GateMetrics`] record.
//!
//! A metric that is required but missing is validated as `0.0` and the
//! message says so; the check is never dropped from the output.

use serde::{Deserialize, Serialize};

use crate::domain::{
    percentage, rate_denominator, Result, Severity, TestCounts, TestPlanResult, Threshold,
    ValidationResult,
};
use crate::registry::{keys, ThresholdRegistry};
use crate::scorer::weighted_coverage;

/// Compare `actual` with `threshold`.
pub fn validate(actual: f64, threshold: &Threshold) -> ValidationResult {
    build_result(actual, threshold, false)
}

/// Like [`validate`], substituting `0.0` for a missing metric.
pub fn validate_optional(actual: Option<f64>, threshold: &Threshold) -> ValidationResult {
    match actual {
        Some(value) => build_result(value, threshold, false),
        None => build_result(0.0, threshold, true),
    }
}

fn build_result(actual: f64, threshold: &Threshold, missing: bool) -> ValidationResult {
    let passed = threshold.is_met_by(actual);
    let mut message = format!(
        "{}: {} (threshold: {} {})",
        threshold.name,
        threshold.format_value(actual),
        threshold.polarity.symbol(),
        threshold.format_value(threshold.value),
    );
    if missing {
        message.push_str(" (metric missing)");
    }

    ValidationResult {
        check_name: threshold.name.clone(),
        threshold_key: threshold.key.clone(),
        passed,
        actual_value: actual,
        threshold_value: threshold.value,
        message,
        severity: Severity::classify(threshold.critical, passed),
    }
}

/// Metrics fed to the quality gates.
///
/// Every field is optional: some come from plan results, the rest from
/// external collaborators (security scanners, profilers). Unknown keys are
/// rejected so a misspelled metric cannot silently drop its check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateMetrics {
    pub overall_coverage: Option<f64>,
    pub critical_path_coverage: Option<f64>,
    pub service_layer_coverage: Option<f64>,
    pub ui_coverage: Option<f64>,

    pub execution_time_minutes: Option<f64>,
    pub slowest_test_seconds: Option<f64>,
    pub performance_regression: Option<f64>,
    pub memory_leaks: Option<f64>,

    pub critical_vulnerabilities: Option<f64>,
    pub high_vulnerabilities: Option<f64>,
    pub medium_vulnerabilities: Option<f64>,
    pub security_test_coverage: Option<f64>,

    pub flaky_rate: Option<f64>,
    pub failure_rate: Option<f64>,
    pub code_quality_score: Option<f64>,

    pub api_response_time_ms: Option<f64>,
    pub database_query_time_ms: Option<f64>,
    pub integration_success_rate: Option<f64>,
}

impl GateMetrics {
    /// Derive the metrics that plan results can answer.
    ///
    /// The integration success rate is only set when a plan whose id
    /// mentions "integration" was requested.
    pub fn from_plan_results(plans: &[TestPlanResult]) -> Self {
        let totals = plans.iter().fold(TestCounts::default(), |acc, p| TestCounts {
            total: acc.total + p.test_count,
            passed: acc.passed + p.passed_count,
            failed: acc.failed + p.failed_count,
            skipped: acc.skipped + p.skipped_count,
        });

        let integration: Vec<&TestPlanResult> = plans
            .iter()
            .filter(|p| p.test_plan.to_lowercase().contains("integration"))
            .collect();
        let integration_success_rate = if integration.is_empty() {
            None
        } else {
            let total: u64 = integration.iter().map(|p| p.test_count).sum();
            let passed: u64 = integration.iter().map(|p| p.passed_count).sum();
            Some(percentage(passed as f64, rate_denominator(total) as f64))
        };

        let total_seconds: f64 = plans.iter().map(|p| p.execution_time_seconds).sum();

        Self {
            overall_coverage: Some(weighted_coverage(plans)),
            execution_time_minutes: Some(total_seconds / 60.0),
            failure_rate: Some(totals.failure_rate()),
            integration_success_rate,
            ..Self::default()
        }
    }

    /// Fill gaps in `self` with values from `other`; `other` wins where both
    /// are set.
    pub fn overlay(self, other: GateMetrics) -> Self {
        Self {
            overall_coverage: other.overall_coverage.or(self.overall_coverage),
            critical_path_coverage: other.critical_path_coverage.or(self.critical_path_coverage),
            service_layer_coverage: other.service_layer_coverage.or(self.service_layer_coverage),
            ui_coverage: other.ui_coverage.or(self.ui_coverage),
            execution_time_minutes: other.execution_time_minutes.or(self.execution_time_minutes),
            slowest_test_seconds: other.slowest_test_seconds.or(self.slowest_test_seconds),
            performance_regression: other.performance_regression.or(self.performance_regression),
            memory_leaks: other.memory_leaks.or(self.memory_leaks),
            critical_vulnerabilities: other
                .critical_vulnerabilities
                .or(self.critical_vulnerabilities),
            high_vulnerabilities: other.high_vulnerabilities.or(self.high_vulnerabilities),
            medium_vulnerabilities: other.medium_vulnerabilities.or(self.medium_vulnerabilities),
            security_test_coverage: other.security_test_coverage.or(self.security_test_coverage),
            flaky_rate: other.flaky_rate.or(self.flaky_rate),
            failure_rate: other.failure_rate.or(self.failure_rate),
            code_quality_score: other.code_quality_score.or(self.code_quality_score),
            api_response_time_ms: other.api_response_time_ms.or(self.api_response_time_ms),
            database_query_time_ms: other.database_query_time_ms.or(self.database_query_time_ms),
            integration_success_rate: other
                .integration_success_rate
                .or(self.integration_success_rate),
        }
    }
}

/// Runs gate check families against a registry.
pub struct Validator<'r> {
    registry: &'r ThresholdRegistry,
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r ThresholdRegistry) -> Self {
        Self { registry }
    }

    /// Required check: always produces a result.
    pub fn check(&self, key: &str, actual: Option<f64>) -> Result<ValidationResult> {
        Ok(validate_optional(actual, self.registry.get(key)?))
    }

    /// Optional checks: only measured metrics produce a result. Every key is
    /// still looked up so an unknown key fails even without data.
    fn check_measured(&self, checks: &[(&str, Option<f64>)]) -> Result<Vec<ValidationResult>> {
        let mut out = Vec::new();
        for &(key, actual) in checks {
            let threshold = self.registry.get(key)?;
            if let Some(value) = actual {
                out.push(validate(value, threshold));
            }
        }
        Ok(out)
    }

    pub fn validate_coverage(&self, metrics: &GateMetrics) -> Result<Vec<ValidationResult>> {
        let mut out = vec![self.check(keys::OVERALL_TEST_COVERAGE, metrics.overall_coverage)?];
        out.extend(self.check_measured(&[
            (keys::CRITICAL_PATH_COVERAGE, metrics.critical_path_coverage),
            (keys::SERVICE_LAYER_COVERAGE, metrics.service_layer_coverage),
            (keys::UI_TEST_COVERAGE, metrics.ui_coverage),
        ])?);
        Ok(out)
    }

    pub fn validate_performance(&self, metrics: &GateMetrics) -> Result<Vec<ValidationResult>> {
        let total = self.check(keys::MAX_TEST_EXECUTION_TIME, metrics.execution_time_minutes)?;
        let mut out = vec![total];
        out.extend(self.check_measured(&[
            (keys::MAX_INDIVIDUAL_TEST_TIME, metrics.slowest_test_seconds),
            (keys::PERFORMANCE_REGRESSION, metrics.performance_regression),
            (keys::MEMORY_LEAKS, metrics.memory_leaks),
        ])?);
        Ok(out)
    }

    pub fn validate_security(&self, metrics: &GateMetrics) -> Result<Vec<ValidationResult>> {
        self.check_measured(&[
            (keys::CRITICAL_VULNERABILITIES, metrics.critical_vulnerabilities),
            (keys::HIGH_VULNERABILITIES, metrics.high_vulnerabilities),
            (keys::MEDIUM_VULNERABILITIES, metrics.medium_vulnerabilities),
            (keys::SECURITY_TEST_COVERAGE, metrics.security_test_coverage),
        ])
    }

    pub fn validate_reliability(&self, metrics: &GateMetrics) -> Result<Vec<ValidationResult>> {
        let mut out = vec![self.check(keys::TEST_FAILURE_RATE, metrics.failure_rate)?];
        out.extend(self.check_measured(&[
            (keys::TEST_FLAKY_RATE, metrics.flaky_rate),
            (keys::CODE_QUALITY_SCORE, metrics.code_quality_score),
        ])?);
        Ok(out)
    }

    pub fn validate_integration(&self, metrics: &GateMetrics) -> Result<Vec<ValidationResult>> {
        self.check_measured(&[
            (keys::API_RESPONSE_TIME, metrics.api_response_time_ms),
            (keys::DATABASE_QUERY_TIME, metrics.database_query_time_ms),
            (keys::INTEGRATION_TEST_SUCCESS, metrics.integration_success_rate),
        ])
    }

    /// All families, in a fixed order.
    pub fn validate_all(&self, metrics: &GateMetrics) -> Result<Vec<ValidationResult>> {
        let mut out = self.validate_coverage(metrics)?;
        out.extend(self.validate_performance(metrics)?);
        out.extend(self.validate_security(metrics)?);
        out.extend(self.validate_reliability(metrics)?);
        out.extend(self.validate_integration(metrics)?);
        Ok(out)
    }
}
