//! testgate CI - test plan execution
//!
//! Provides:
//! - The [`PlanExecutor`] boundary and a process-backed [`CommandExecutor`]
//! - An [`Orchestrator`] running plans sequentially or concurrently with
//!   per-plan timeouts and an optional run budget
//! - A [`ValidationPipeline`] that turns plan results into a report

pub mod command;
pub mod executor;
pub mod fakes;
pub mod orchestrator;
pub mod pipeline;

// Re-export key types
pub use command::{read_metrics_file, CommandConfig, CommandExecutor, MetricsFile};
pub use executor::{BuildOutput, ExecutionOutput, PlanExecutor};
pub use orchestrator::{
    BuildStrategy, ExecutionMode, Orchestrator, OrchestratorConfig, DEFAULT_BUILD_TIMEOUT,
    DEFAULT_PLAN_TIMEOUT,
};
pub use pipeline::ValidationPipeline;
