//! Observability tests for the validation run lifecycle.
//!
//! These tests verify that structured tracing events are emitted for run
//! start, plan completion, gate evaluation and run finish.

use testgate_core::{
    emit_gate_evaluated, emit_plan_finished, emit_run_finished, emit_run_started, run_span,
    PlanState, TestPlanResult,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_started_logs_plan_count_and_mode() {
    emit_run_started("run-123", 4, "concurrent");

    assert!(logs_contain("run.started"));
    assert!(logs_contain("run-123"));
    assert!(logs_contain("concurrent"));
}

#[traced_test]
#[test]
fn test_emit_plan_finished_success_is_info() {
    let mut result = TestPlanResult::synthesized("UnitTestPlan", PlanState::Completed, 3.0, "x");
    result.success = true;
    result.errors.clear();
    emit_plan_finished(&result);

    assert!(logs_contain("plan.finished"));
    assert!(logs_contain("UnitTestPlan"));
    assert!(!logs_contain("WARN"));
}

/// Failed plans are logged at warn level with their first error
#[traced_test]
#[test]
fn test_emit_plan_finished_failure_is_warning() {
    let result = TestPlanResult::synthesized(
        "SecurityTestPlan",
        PlanState::TimedOut,
        1800.0,
        "Test plan SecurityTestPlan timed out after 1800s",
    );
    emit_plan_finished(&result);

    assert!(logs_contain("WARN"));
    assert!(logs_contain("timed_out"));
    assert!(logs_contain("timed out after 1800s"));
}

#[traced_test]
#[test]
fn test_emit_gate_evaluated_logs_score() {
    emit_gate_evaluated("run-gate-001", 5, 85.0, false);

    assert!(logs_contain("gate.evaluated"));
    assert!(logs_contain("passed=false"));
}

#[traced_test]
#[test]
fn test_emit_run_finished_logs_success() {
    emit_run_finished("run-456", 42.5, true);

    assert!(logs_contain("run.finished"));
    assert!(logs_contain("success=true"));
}

#[traced_test]
#[test]
fn test_run_span_carries_run_id() {
    run_span("test-span-run").in_scope(|| tracing::info!("inside span"));

    assert!(logs_contain("test-span-run"));
}
