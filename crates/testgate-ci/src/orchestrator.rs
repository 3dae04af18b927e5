//! Test plan orchestration.
//!
//! Every requested plan yields exactly one [`TestPlanResult`], in request
//! order. Executor errors, timeouts, build failures and panics are converted
//! into failed results; nothing a single plan does can abort the run.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use testgate_core::{
    emit_plan_finished, plan_quality_score, GateError, PlanState, TestPlanResult,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::executor::{ExecutionOutput, PlanExecutor};

/// Default per-plan test timeout (30 minutes).
pub const DEFAULT_PLAN_TIMEOUT: Duration = Duration::from_secs(1800);

/// Default per-plan build timeout (10 minutes).
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// How plans are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Concurrent,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
        }
    }
}

/// When the build phase runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// Each plan builds before it tests.
    #[default]
    PerPlan,
    /// One shared build before any plan runs.
    Once,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub plan_timeout: Duration,
    pub build_timeout: Duration,
    /// Overall budget for the whole run. Plans still unfinished when it
    /// expires are recorded as timed out.
    pub run_timeout: Option<Duration>,
    /// Cap on plans in flight in concurrent mode.
    pub max_concurrent: Option<usize>,
    pub build_strategy: BuildStrategy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            plan_timeout: DEFAULT_PLAN_TIMEOUT,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            run_timeout: None,
            max_concurrent: None,
            build_strategy: BuildStrategy::PerPlan,
        }
    }
}

/// Per-plan limits handed to each task.
#[derive(Debug, Clone, Copy)]
struct PlanLimits {
    plan_timeout: Duration,
    build_timeout: Duration,
    build: bool,
}

pub struct Orchestrator {
    executor: Arc<dyn PlanExecutor>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(executor: Arc<dyn PlanExecutor>, config: OrchestratorConfig) -> Self {
        Self { executor, config }
    }

    /// Run all `plan_ids` and return one result per plan, in request order.
    #[instrument(skip(self, plan_ids, mode), fields(plans = plan_ids.len(), mode = mode.as_str()))]
    pub async fn run(&self, plan_ids: &[String], mode: ExecutionMode) -> Vec<TestPlanResult> {
        let started = Instant::now();
        let deadline = self.config.run_timeout.map(|budget| started + budget);

        let mut limits = PlanLimits {
            plan_timeout: self.config.plan_timeout,
            build_timeout: self.config.build_timeout,
            build: self.executor.requires_build(),
        };

        if limits.build && self.config.build_strategy == BuildStrategy::Once {
            if let Err((state, reason)) = self.shared_build(deadline).await {
                let elapsed = started.elapsed().as_secs_f64();
                return plan_ids
                    .iter()
                    .map(|plan_id| {
                        let message = match state {
                            PlanState::TimedOut => budget_message(self.config.run_timeout, plan_id),
                            _ => format!("Build failed for {plan_id}: {reason}"),
                        };
                        let result = TestPlanResult::synthesized(plan_id, state, elapsed, message);
                        emit_plan_finished(&result);
                        result
                    })
                    .collect();
            }
            limits.build = false;
        }

        let results = match mode {
            ExecutionMode::Concurrent => self.run_concurrent(plan_ids, limits, deadline).await,
            ExecutionMode::Sequential => self.run_sequential(plan_ids, limits, deadline).await,
        };

        info!(
            plans = results.len(),
            failed = results.iter().filter(|r| !r.success).count(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "orchestration finished"
        );
        results
    }

    /// Shared build for [`BuildStrategy::Once`]. On failure returns the state
    /// every plan settles in and the reason.
    async fn shared_build(&self, deadline: Option<Instant>) -> Result<(), (PlanState, String)> {
        let build_timeout = self.config.build_timeout;
        let limit = Instant::now() + build_timeout;
        let bounded_by_budget = deadline.is_some_and(|d| d < limit);
        let limit = deadline.map_or(limit, |d| d.min(limit));

        info!("running shared build");
        match timeout_at(limit, self.executor.build(None, build_timeout)).await {
            Ok(Ok(output)) if output.success => Ok(()),
            Ok(Ok(output)) => Err((
                PlanState::BuildFailed,
                first_line_or(&output.stderr, "build exited unsuccessfully"),
            )),
            Ok(Err(e)) => Err((PlanState::BuildFailed, e.to_string())),
            Err(_) if bounded_by_budget => Err((PlanState::TimedOut, String::new())),
            Err(_) => Err((
                PlanState::BuildFailed,
                format!("timed out after {}s", build_timeout.as_secs()),
            )),
        }
    }

    async fn run_concurrent(
        &self,
        plan_ids: &[String],
        limits: PlanLimits,
        deadline: Option<Instant>,
    ) -> Vec<TestPlanResult> {
        let semaphore = self
            .config
            .max_concurrent
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        let handles: Vec<(&String, Instant, JoinHandle<TestPlanResult>)> = plan_ids
            .iter()
            .map(|plan_id| {
                let semaphore = semaphore.clone();
                let handle = self.spawn_plan(plan_id, limits, semaphore);
                (plan_id, Instant::now(), handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (plan_id, spawned_at, handle) in handles {
            let result = self.settle(plan_id, spawned_at, handle, deadline).await;
            emit_plan_finished(&result);
            results.push(result);
        }
        results
    }

    async fn run_sequential(
        &self,
        plan_ids: &[String],
        limits: PlanLimits,
        deadline: Option<Instant>,
    ) -> Vec<TestPlanResult> {
        let mut results = Vec::with_capacity(plan_ids.len());
        for plan_id in plan_ids {
            let spawned_at = Instant::now();
            let result = if deadline.is_some_and(|d| spawned_at >= d) {
                TestPlanResult::synthesized(
                    plan_id,
                    PlanState::TimedOut,
                    0.0,
                    budget_message(self.config.run_timeout, plan_id),
                )
            } else {
                let handle = self.spawn_plan(plan_id, limits, None);
                self.settle(plan_id, spawned_at, handle, deadline).await
            };
            emit_plan_finished(&result);
            results.push(result);
        }
        results
    }

    fn spawn_plan(
        &self,
        plan_id: &str,
        limits: PlanLimits,
        semaphore: Option<Arc<Semaphore>>,
    ) -> JoinHandle<TestPlanResult> {
        let executor = Arc::clone(&self.executor);
        let plan_id = plan_id.to_string();
        tokio::spawn(async move {
            let _permit = match semaphore {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            execute_plan(executor.as_ref(), &plan_id, limits).await
        })
    }

    /// Await one plan task, bounded by the run deadline.
    async fn settle(
        &self,
        plan_id: &str,
        spawned_at: Instant,
        mut handle: JoinHandle<TestPlanResult>,
        deadline: Option<Instant>,
    ) -> TestPlanResult {
        let joined = match deadline {
            Some(deadline) => match timeout_at(deadline, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    warn!(plan = %plan_id, "run budget exhausted, aborting plan");
                    return TestPlanResult::synthesized(
                        plan_id,
                        PlanState::TimedOut,
                        spawned_at.elapsed().as_secs_f64(),
                        budget_message(self.config.run_timeout, plan_id),
                    );
                }
            },
            None => handle.await,
        };

        joined.unwrap_or_else(|e| {
            let reason = if e.is_panic() {
                "task panicked".to_string()
            } else {
                e.to_string()
            };
            TestPlanResult::synthesized(
                plan_id,
                PlanState::Completed,
                spawned_at.elapsed().as_secs_f64(),
                format!("Exception during {plan_id} execution: {reason}"),
            )
        })
    }
}

/// Build (if needed) and test one plan, converting every failure into a
/// result.
async fn execute_plan(
    executor: &dyn PlanExecutor,
    plan_id: &str,
    limits: PlanLimits,
) -> TestPlanResult {
    let started = Instant::now();
    debug!(plan = %plan_id, build = limits.build, "plan started");

    drive_plan(executor, plan_id, limits, started)
        .await
        .unwrap_or_else(|e| {
            TestPlanResult::synthesized(
                plan_id,
                PlanState::Completed,
                started.elapsed().as_secs_f64(),
                format!("Exception during {plan_id} execution: {e}"),
            )
        })
}

async fn drive_plan(
    executor: &dyn PlanExecutor,
    plan_id: &str,
    limits: PlanLimits,
    started: Instant,
) -> testgate_core::Result<TestPlanResult> {
    let elapsed = || started.elapsed().as_secs_f64();
    let mut state = PlanState::Pending;

    if limits.build {
        state = state.advance(PlanState::Building)?;
        let build = executor.build(Some(plan_id), limits.build_timeout);
        let failure = match timeout(limits.build_timeout, build).await {
            Ok(Ok(output)) if output.success => None,
            Ok(Ok(output)) => Some(first_line_or(&output.stderr, "build exited unsuccessfully")),
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {}s", limits.build_timeout.as_secs())),
        };
        if let Some(reason) = failure {
            let state = state.advance(PlanState::BuildFailed)?;
            return Ok(TestPlanResult::synthesized(
                plan_id,
                state,
                elapsed(),
                format!("Build failed for {plan_id}: {reason}"),
            ));
        }
    }

    state = state.advance(PlanState::Testing)?;
    let run = executor.run_plan(plan_id, limits.plan_timeout);
    match timeout(limits.plan_timeout, run).await {
        Ok(Ok(output)) => {
            let state = state.advance(PlanState::Completed)?;
            Ok(plan_result(plan_id, state, output, elapsed()))
        }
        Ok(Err(e)) if e.downcast_ref::<GateError>().is_some_and(GateError::is_timeout) => {
            let state = state.advance(PlanState::TimedOut)?;
            Ok(TestPlanResult::synthesized(plan_id, state, elapsed(), e.to_string()))
        }
        Ok(Err(e)) => {
            let state = state.advance(PlanState::Completed)?;
            Ok(TestPlanResult::synthesized(
                plan_id,
                state,
                elapsed(),
                format!("Exception during {plan_id} execution: {e:#}"),
            ))
        }
        Err(_) => {
            let state = state.advance(PlanState::TimedOut)?;
            Ok(TestPlanResult::synthesized(
                plan_id,
                state,
                elapsed(),
                format!(
                    "Test plan {plan_id} timed out after {}s",
                    limits.plan_timeout.as_secs()
                ),
            ))
        }
    }
}

/// Turn executor output into a plan result. Missing metrics become zeroes
/// with a warning.
fn plan_result(
    plan_id: &str,
    state: PlanState,
    output: ExecutionOutput,
    elapsed: f64,
) -> TestPlanResult {
    let mut warnings = output.warnings;
    let mut errors = output.errors;

    let coverage = match output.coverage {
        Some(coverage) => coverage.percentage(),
        None => {
            warnings.push(format!("No coverage data reported for {plan_id}"));
            0.0
        }
    };
    let counts = output.counts.unwrap_or_else(|| {
        warnings.push(format!("No test counts reported for {plan_id}"));
        Default::default()
    });
    let resources = output.resources.unwrap_or_default();

    if !output.success && errors.is_empty() {
        errors.push(first_line_or(&output.stderr, &format!("Test plan {plan_id} failed")));
    }

    TestPlanResult {
        test_plan: plan_id.to_string(),
        state,
        success: output.success,
        execution_time_seconds: elapsed,
        coverage_percentage: coverage,
        test_count: counts.total,
        passed_count: counts.passed,
        failed_count: counts.failed,
        skipped_count: counts.skipped,
        memory_usage_mb: resources.memory_mb,
        cpu_usage_percentage: resources.cpu_percent,
        errors,
        warnings,
        quality_score: plan_quality_score(output.success, coverage, &counts, &resources),
    }
}

fn budget_message(budget: Option<Duration>, plan_id: &str) -> String {
    let secs = budget.map(|b| b.as_secs()).unwrap_or_default();
    format!("Run budget of {secs}s exhausted before {plan_id} finished")
}

fn first_line_or(text: &str, fallback: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use testgate_core::{CoverageData, ResourceUsage, TestCounts};

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.plan_timeout, Duration::from_secs(1800));
        assert_eq!(config.build_timeout, Duration::from_secs(600));
        assert!(config.run_timeout.is_none());
        assert_eq!(config.build_strategy, BuildStrategy::PerPlan);
    }

    #[test]
    fn test_plan_result_from_output() {
        let output = ExecutionOutput {
            success: true,
            coverage: Some(CoverageData {
                covered_lines: 90,
                executable_lines: 100,
            }),
            counts: Some(TestCounts {
                total: 10,
                passed: 10,
                failed: 0,
                skipped: 0,
            }),
            resources: Some(ResourceUsage {
                memory_mb: 0.0,
                cpu_percent: 12.5,
            }),
            ..Default::default()
        };

        let result = plan_result("UnitTestPlan", PlanState::Completed, output, 4.0);
        assert!(result.success);
        assert_eq!(result.coverage_percentage, 90.0);
        assert_eq!(result.test_count, 10);
        assert_eq!(result.quality_score, 100.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_plan_result_missing_metrics_warns() {
        let output = ExecutionOutput {
            success: false,
            stderr: "\n  assertion failed: left == right\nmore".to_string(),
            ..Default::default()
        };

        let result = plan_result("UnitTestPlan", PlanState::Completed, output, 1.0);
        assert!(!result.success);
        assert_eq!(result.coverage_percentage, 0.0);
        assert_eq!(result.quality_score, 0.0);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.errors, vec!["assertion failed: left == right"]);
    }

    #[test]
    fn test_budget_message() {
        assert_eq!(
            budget_message(Some(Duration::from_secs(60)), "SecurityTestPlan"),
            "Run budget of 60s exhausted before SecurityTestPlan finished"
        );
    }
}
