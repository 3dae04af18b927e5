//! End-to-end validation run: orchestrate, validate, score, report.

use std::sync::Arc;

use chrono::Utc;
use testgate_core::{
    emit_gate_evaluated, emit_run_finished, emit_run_started, run_span, GateMetrics, PlanState,
    ReportBuilder, ThresholdRegistry, ValidationReport, Validator,
};
use tokio::time::Instant;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::executor::PlanExecutor;
use crate::orchestrator::{ExecutionMode, Orchestrator, OrchestratorConfig};

/// Validation pipeline.
///
/// Owns the (immutable) threshold registry for the duration of the run.
pub struct ValidationPipeline {
    orchestrator: Orchestrator,
    registry: ThresholdRegistry,
    report_builder: ReportBuilder,
}

impl ValidationPipeline {
    pub fn new(
        executor: Arc<dyn PlanExecutor>,
        registry: ThresholdRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(executor, config),
            registry,
            report_builder: ReportBuilder::default(),
        }
    }

    pub fn with_report_builder(mut self, report_builder: ReportBuilder) -> Self {
        self.report_builder = report_builder;
        self
    }

    /// Run `plan_ids`, validate the derived metrics (with `extra` taking
    /// precedence) and build the report.
    ///
    /// Plan failures never surface as errors here; they are part of the
    /// report. Errors mean the gate itself could not be evaluated.
    pub async fn run(
        &self,
        plan_ids: &[String],
        mode: ExecutionMode,
        extra: GateMetrics,
    ) -> anyhow::Result<ValidationReport> {
        let run_id = Uuid::new_v4();
        let span = run_span(&run_id.to_string());
        self.run_inner(run_id, plan_ids, mode, extra)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        plan_ids: &[String],
        mode: ExecutionMode,
        extra: GateMetrics,
    ) -> anyhow::Result<ValidationReport> {
        let run_id_str = run_id.to_string();
        let start = Instant::now();

        emit_run_started(&run_id_str, plan_ids.len(), mode.as_str());

        // Results keep their terminal execution state in the report.
        let plans = self.orchestrator.run(plan_ids, mode).await;
        for plan in &plans {
            plan.state.advance(PlanState::Validated)?;
        }

        let metrics = GateMetrics::from_plan_results(&plans).overlay(extra);
        let gate_checks = Validator::new(&self.registry).validate_all(&metrics)?;

        let summary = testgate_core::summarize(&gate_checks);
        emit_gate_evaluated(
            &run_id_str,
            summary.total_checks,
            summary.quality_score,
            summary.overall_passed,
        );

        let total_execution_time = start.elapsed().as_secs_f64();
        let report = self.report_builder.build(
            run_id,
            plans,
            gate_checks,
            total_execution_time,
            Utc::now(),
        );

        info!(
            run_id = %run_id_str,
            tests = report.total_tests,
            coverage = report.overall_coverage,
            "validation report built"
        );
        emit_run_finished(&run_id_str, total_execution_time, report.overall_success);

        Ok(report)
    }
}
