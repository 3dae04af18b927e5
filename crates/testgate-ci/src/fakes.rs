//! Scripted in-memory executor (testing only)
//!
//! [`ScriptedExecutor`] satisfies the [`PlanExecutor`] contract without
//! spawning processes. Each plan id is mapped to a [`Behavior`]; unknown plans
//! pass with [`passing_output`] defaults. Calls are recorded so tests can
//! assert on build counts and concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use testgate_core::{CoverageData, GateError, ResourceUsage, TestCounts};

use crate::executor::{BuildOutput, ExecutionOutput, PlanExecutor};

/// What a scripted plan does when run.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Sleep for `delay`, then return `output`.
    Pass {
        delay: Duration,
        output: ExecutionOutput,
    },
    /// Sleep for `delay`, then return an executor error.
    Error { delay: Duration, message: String },
    /// Return a `GateError::Timeout` from the executor itself.
    ReportTimeout { seconds: u64 },
    /// Never complete.
    Hang,
    /// Fail the per-plan build.
    BuildFail { message: String },
    /// Panic inside the plan task.
    Panic,
}

impl Behavior {
    pub fn pass(output: ExecutionOutput) -> Self {
        Self::Pass {
            delay: Duration::ZERO,
            output,
        }
    }

    pub fn pass_after(delay: Duration, output: ExecutionOutput) -> Self {
        Self::Pass { delay, output }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            delay: Duration::ZERO,
            message: message.into(),
        }
    }
}

/// Successful output with `covered` of 100 lines covered and `passed` of
/// `total` tests passing.
pub fn passing_output(covered: u64, total: u64, passed: u64) -> ExecutionOutput {
    ExecutionOutput {
        success: passed == total,
        duration_secs: 0.0,
        stdout: format!("{passed} passed"),
        stderr: String::new(),
        coverage: Some(CoverageData {
            covered_lines: covered,
            executable_lines: 100,
        }),
        counts: Some(TestCounts {
            total,
            passed,
            failed: total - passed,
            skipped: 0,
        }),
        resources: Some(ResourceUsage {
            memory_mb: 128.0,
            cpu_percent: 40.0,
        }),
        errors: Vec::new(),
        warnings: Vec::new(),
    }
}

/// In-memory executor driven by per-plan [`Behavior`]s.
#[derive(Debug)]
pub struct ScriptedExecutor {
    behaviors: HashMap<String, Behavior>,
    requires_build: bool,
    shared_build_failure: Option<String>,
    build_calls: Mutex<Vec<Option<String>>>,
    run_calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self {
            behaviors: HashMap::new(),
            requires_build: true,
            shared_build_failure: None,
            build_calls: Mutex::new(Vec::new()),
            run_calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(mut self, plan_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(plan_id.to_string(), behavior);
        self
    }

    pub fn without_build(mut self) -> Self {
        self.requires_build = false;
        self
    }

    /// Make the shared (build-once) build fail with `message`.
    pub fn failing_shared_build(mut self, message: &str) -> Self {
        self.shared_build_failure = Some(message.to_string());
        self
    }

    /// Build calls in call order; `None` is the shared build.
    pub fn build_calls(&self) -> Vec<Option<String>> {
        self.build_calls.lock().unwrap().clone()
    }

    /// Plans whose tests were started, in call order.
    pub fn run_calls(&self) -> Vec<String> {
        self.run_calls.lock().unwrap().clone()
    }

    /// Highest number of plans observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn behavior(&self, plan_id: &str) -> Behavior {
        self.behaviors
            .get(plan_id)
            .cloned()
            .unwrap_or_else(|| Behavior::pass(passing_output(85, 10, 10)))
    }
}

/// Decrements the in-flight counter even when the plan future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlanExecutor for ScriptedExecutor {
    fn requires_build(&self) -> bool {
        self.requires_build
    }

    async fn build(
        &self,
        plan_id: Option<&str>,
        _timeout: Duration,
    ) -> anyhow::Result<BuildOutput> {
        self.build_calls
            .lock()
            .unwrap()
            .push(plan_id.map(str::to_string));

        let failure = match plan_id {
            None => self.shared_build_failure.clone(),
            Some(id) => match self.behavior(id) {
                Behavior::BuildFail { message } => Some(message),
                _ => None,
            },
        };

        Ok(match failure {
            Some(message) => BuildOutput {
                success: false,
                duration_secs: 0.0,
                stderr: message,
            },
            None => BuildOutput::ok(),
        })
    }

    async fn run_plan(&self, plan_id: &str, _timeout: Duration) -> anyhow::Result<ExecutionOutput> {
        self.run_calls.lock().unwrap().push(plan_id.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.behavior(plan_id) {
            Behavior::Pass { delay, output } => {
                tokio::time::sleep(delay).await;
                Ok(output)
            }
            Behavior::Error { delay, message } => {
                tokio::time::sleep(delay).await;
                Err(anyhow::anyhow!(message))
            }
            Behavior::ReportTimeout { seconds } => Err(GateError::Timeout {
                plan_id: plan_id.to_string(),
                seconds,
            }
            .into()),
            Behavior::Hang => {
                futures::future::pending::<()>().await;
                unreachable!("pending future completed")
            }
            Behavior::BuildFail { .. } => Ok(passing_output(85, 10, 10)),
            Behavior::Panic => panic!("scripted panic in {plan_id}"),
        }
    }
}
