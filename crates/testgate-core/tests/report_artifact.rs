use chrono::Utc;
use tempfile::tempdir;
use testgate_core::{
    keys, read_report_artifact, render_summary, validate, write_report_artifact,
    write_report_json, GateError, PlanState, ReportBuilder, TestPlanResult, ThresholdRegistry,
    ValidationReport,
};
use uuid::Uuid;

fn sample_report() -> ValidationReport {
    let registry = ThresholdRegistry::defaults();
    let coverage = registry.get(keys::OVERALL_TEST_COVERAGE).expect("threshold");
    let ui = registry.get(keys::UI_TEST_COVERAGE).expect("threshold");

    let plans = vec![
        TestPlanResult::synthesized(
            "PerformanceTestPlan",
            PlanState::TimedOut,
            1800.0,
            "Test plan PerformanceTestPlan timed out after 1800s",
        ),
        TestPlanResult {
            test_plan: "UnitTestPlan".to_string(),
            state: PlanState::Completed,
            success: true,
            execution_time_seconds: 42.0,
            coverage_percentage: 92.5,
            test_count: 120,
            passed_count: 118,
            failed_count: 0,
            skipped_count: 2,
            memory_usage_mb: 210.0,
            cpu_usage_percentage: 55.0,
            errors: vec![],
            warnings: vec![],
            quality_score: 93.2,
        },
    ];
    let checks = vec![validate(92.5, coverage), validate(70.0, ui)];

    ReportBuilder::default().build(Uuid::new_v4(), plans, checks, 1842.0, Utc::now())
}

#[test]
fn artifact_round_trips_with_digest() {
    let dir = tempdir().expect("tempdir");
    let report = sample_report();

    let path = write_report_artifact(&report, dir.path()).expect("write artifact");
    assert_eq!(
        path,
        dir.path().join(report.run_id.to_string()).join("report.json")
    );
    assert!(path.with_file_name("report.digest").exists());

    let loaded = read_report_artifact(&report.run_id, dir.path()).expect("read artifact");
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.test_plan_results.len(), 2);
    assert_eq!(loaded.recommendations, report.recommendations);
}

#[test]
fn tampered_artifact_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let report = sample_report();
    let path = write_report_artifact(&report, dir.path()).expect("write artifact");

    let tampered = std::fs::read_to_string(&path)
        .expect("read")
        .replace("\"overall_success\": false", "\"overall_success\": true");
    std::fs::write(&path, tampered).expect("write");

    let err = read_report_artifact(&report.run_id, dir.path()).expect_err("must reject");
    assert!(matches!(err, GateError::DigestMismatch { .. }));
}

#[test]
fn report_json_has_stable_field_names() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("report.json");
    write_report_json(&path, &sample_report()).expect("write report");

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    for field in [
        "run_id",
        "overall_success",
        "total_execution_time",
        "total_tests",
        "total_passed",
        "total_failed",
        "overall_coverage",
        "overall_quality_score",
        "test_plan_results",
        "quality_gate_results",
        "gate_checks",
        "recommendations",
        "next_steps",
        "timestamp",
    ] {
        assert!(value.get(field).is_some(), "missing {field}");
    }
    assert_eq!(value["gate_checks"][1]["severity"], "WARNING");
    assert_eq!(value["test_plan_results"][0]["state"], "timed_out");
    assert_eq!(value["test_plan_results"][1]["state"], "completed");
}

#[test]
fn summary_lists_plans_and_recommendations() {
    let report = sample_report();
    let summary = render_summary(&report);

    assert!(summary.contains("Overall status: FAILED"));
    assert!(summary.contains("Blocked by: 1 failed plan(s), 0 critical gate failure(s)"));
    assert!(summary.contains("✗ PerformanceTestPlan [timed_out]"));
    assert!(summary.contains("✓ UnitTestPlan [completed]"));
    assert!(summary.contains("timed out after 1800s"));
    assert!(summary.contains("Fix failing test plans: PerformanceTestPlan"));
    assert!(summary.contains("Optimize performance for slow test plans: PerformanceTestPlan"));
    assert!(summary.contains("Address 1 warning(s) to improve quality score"));
}
