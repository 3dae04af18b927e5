//! testgate Core Library
//!
//! Domain model and pure logic of the quality gate: threshold registry,
//! validator, scorer and report builder. Execution of test plans lives in
//! `testgate-ci`.

pub mod domain;
pub mod obs;
pub mod registry;
pub mod reporting;
pub mod scorer;
pub mod telemetry;
pub mod validator;

pub use domain::{
    percentage, rate_denominator, CoverageData, GateError, GateSummary, PlanState, Polarity,
    ResourceUsage, Result, Severity, TestCounts, TestPlanResult, Threshold, ValidationReport,
    ValidationResult,
};

pub use registry::{keys, ThresholdOverrides, ThresholdRegistry};

pub use validator::{validate, validate_optional, GateMetrics, Validator};

pub use scorer::{
    mean_quality_score, overall_success, plan_quality_score, score, summarize, weighted_coverage,
};

pub use reporting::{
    next_steps, read_report_artifact, render_summary, write_report_artifact, write_report_json,
    ReportBuilder,
};

pub use obs::{
    emit_gate_evaluated, emit_plan_finished, emit_run_finished, emit_run_started, run_span,
};
pub use telemetry::init_tracing;

/// testgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
