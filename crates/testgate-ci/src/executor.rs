//! Executor boundary.
//!
//! The orchestrator only talks to test tooling through [`PlanExecutor`]. How a
//! plan is built and run, and how raw tool output becomes metrics, is the
//! executor's business.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use testgate_core::{CoverageData, ResourceUsage, TestCounts};

/// Result of a build phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub success: bool,
    pub duration_secs: f64,
    pub stderr: String,
}

impl BuildOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }
}

/// Result of running one test plan.
///
/// Metric fields are `None` when the executor could not extract them; the
/// orchestrator substitutes zeroes and records a warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub success: bool,
    pub duration_secs: f64,
    pub stdout: String,
    pub stderr: String,
    pub coverage: Option<CoverageData>,
    pub counts: Option<TestCounts>,
    pub resources: Option<ResourceUsage>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Builds and runs test plans.
///
/// Errors returned here never abort a run: the orchestrator converts them
/// into failed plan results. Return a `testgate_core::GateError::Timeout`
/// (wrapped in `anyhow`) to have the plan recorded as timed out.
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    /// Whether plans need a build phase before testing.
    fn requires_build(&self) -> bool {
        true
    }

    /// Build for `plan_id`. `None` builds the shared artifacts used by every
    /// plan (build-once strategy).
    async fn build(&self, plan_id: Option<&str>, timeout: Duration) -> anyhow::Result<BuildOutput>;

    /// Run the tests of `plan_id`.
    async fn run_plan(&self, plan_id: &str, timeout: Duration) -> anyhow::Result<ExecutionOutput>;
}
