//! Structured observability hooks for the validation run lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span, [`run_span`], attached to async work with
//!   `tracing::Instrument`
//! - Emission functions for lifecycle events: run start, plan finish, gate
//!   evaluation, run finish

use tracing::{info, warn};

use crate::domain::TestPlanResult;

/// Span carrying `run_id` for one validation run.
///
/// Async callers attach it with `Instrument::instrument`; an entered guard
/// must not be held across an `.await`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("testgate.run", run_id = %run_id)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, plan_count: usize, mode: &str) {
    info!(event = "run.started", run_id = %run_id, plans = plan_count, mode = %mode);
}

/// Emit event: one plan reached a terminal state.
///
/// Failed plans are logged at `warn!` with their first error.
pub fn emit_plan_finished(result: &TestPlanResult) {
    if result.success {
        info!(
            event = "plan.finished",
            plan = %result.test_plan,
            state = %result.state,
            duration_secs = result.execution_time_seconds,
            tests = result.test_count,
            quality_score = result.quality_score,
        );
    } else {
        warn!(
            event = "plan.finished",
            plan = %result.test_plan,
            state = %result.state,
            duration_secs = result.execution_time_seconds,
            error = result.errors.first().map(String::as_str).unwrap_or(""),
        );
    }
}

/// Emit event: gate checks evaluated.
pub fn emit_gate_evaluated(run_id: &str, checks: usize, score: f64, passed: bool) {
    info!(
        event = "gate.evaluated",
        run_id = %run_id,
        checks = checks,
        score = score,
        passed = passed,
    );
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, duration_secs: f64, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_secs = duration_secs,
        success = success,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        assert_send(&run_span("test-run-id"));
    }
}
