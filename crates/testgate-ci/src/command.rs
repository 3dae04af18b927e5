//! Process-backed executor.
//!
//! Runs configured build and test commands through `tokio::process`. Every
//! argument containing `{plan}` has it replaced by the plan id. Metrics are
//! not scraped from tool output: the test command is expected to write
//! `<metrics_dir>/<plan>.json` (see [`MetricsFile`]).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use testgate_core::{CoverageData, GateError, ResourceUsage, TestCounts};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::executor::{BuildOutput, ExecutionOutput, PlanExecutor};

pub const PLAN_PLACEHOLDER: &str = "{plan}";

/// Metrics written by the external test tool for one plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsFile {
    pub coverage: Option<CoverageData>,
    pub counts: Option<TestCounts>,
    pub resources: Option<ResourceUsage>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommandConfig {
    /// Working directory for every command.
    pub workdir: Option<PathBuf>,
    /// Build command; `None` skips the build phase.
    pub build_command: Option<Vec<String>>,
    pub test_command: Vec<String>,
    /// Directory holding `<plan>.json` metrics files.
    pub metrics_dir: Option<PathBuf>,
}

impl CommandConfig {
    /// Split a command line on whitespace.
    pub fn split(command: &str) -> Vec<String> {
        command.split_whitespace().map(str::to_string).collect()
    }
}

/// Captured output of one process.
#[derive(Debug)]
struct ProcessOutput {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
    duration_secs: f64,
}

pub struct CommandExecutor {
    config: CommandConfig,
}

impl CommandExecutor {
    pub fn new(config: CommandConfig) -> anyhow::Result<Self> {
        if config.test_command.is_empty() {
            return Err(GateError::Config("test command is empty".to_string()).into());
        }
        if config.build_command.as_ref().is_some_and(Vec::is_empty) {
            return Err(GateError::Config("build command is empty".to_string()).into());
        }
        Ok(Self { config })
    }

    /// Substitute the plan id into `command`. Without a plan (shared build)
    /// placeholder arguments are dropped.
    fn render(command: &[String], plan_id: Option<&str>) -> Vec<String> {
        command
            .iter()
            .filter_map(|arg| match plan_id {
                Some(id) => Some(arg.replace(PLAN_PLACEHOLDER, id)),
                None if arg.contains(PLAN_PLACEHOLDER) => None,
                None => Some(arg.clone()),
            })
            .collect()
    }

    async fn spawn(
        &self,
        label: &str,
        argv: &[String],
        timeout: Duration,
    ) -> anyhow::Result<ProcessOutput> {
        let (exe, args) = argv
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("{label}: empty command"))?;

        let start = Instant::now();
        let mut command = Command::new(exe);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.workdir {
            command.current_dir(dir);
        }

        debug!(label = %label, command = %argv.join(" "), "spawning");
        let child = command.spawn().map_err(|e| GateError::Execution {
            plan_id: label.to_string(),
            reason: format!("failed to spawn {exe}: {e}"),
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| GateError::Timeout {
                plan_id: label.to_string(),
                seconds: timeout.as_secs(),
            })??;

        Ok(ProcessOutput {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn metrics_path(&self, plan_id: &str) -> Option<PathBuf> {
        self.config
            .metrics_dir
            .as_ref()
            .map(|dir| dir.join(format!("{plan_id}.json")))
    }
}

/// Read a metrics file. A missing or unreadable file is not an error for the
/// plan; it only produces a warning.
pub async fn read_metrics_file(path: &Path) -> Result<MetricsFile, String> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(format!("No metrics file at {}", path.display()));
        }
        Err(e) => return Err(format!("Cannot read metrics file {}: {e}", path.display())),
    };
    serde_json::from_str(&content)
        .map_err(|e| format!("Malformed metrics file {}: {e}", path.display()))
}

#[async_trait]
impl PlanExecutor for CommandExecutor {
    fn requires_build(&self) -> bool {
        self.config.build_command.is_some()
    }

    async fn build(&self, plan_id: Option<&str>, timeout: Duration) -> anyhow::Result<BuildOutput> {
        let Some(command) = &self.config.build_command else {
            return Ok(BuildOutput::ok());
        };
        let argv = Self::render(command, plan_id);
        let output = self
            .spawn(plan_id.unwrap_or("shared build"), &argv, timeout)
            .await?;

        Ok(BuildOutput {
            success: output.success,
            duration_secs: output.duration_secs,
            stderr: output.stderr,
        })
    }

    async fn run_plan(&self, plan_id: &str, timeout: Duration) -> anyhow::Result<ExecutionOutput> {
        let argv = Self::render(&self.config.test_command, Some(plan_id));
        let process = self.spawn(plan_id, &argv, timeout).await?;

        let mut output = ExecutionOutput {
            success: process.success,
            duration_secs: process.duration_secs,
            stdout: process.stdout,
            stderr: process.stderr,
            ..ExecutionOutput::default()
        };
        if !process.success {
            output
                .errors
                .push(format!("{plan_id} exited with code {}", process.exit_code));
        }

        if let Some(path) = self.metrics_path(plan_id) {
            match read_metrics_file(&path).await {
                Ok(metrics) => {
                    output.coverage = metrics.coverage;
                    output.counts = metrics.counts;
                    output.resources = metrics.resources;
                    output.errors.extend(metrics.errors);
                    output.warnings.extend(metrics.warnings);
                }
                Err(message) => {
                    warn!(plan = %plan_id, "{message}");
                    output.warnings.push(message);
                }
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_substitutes_plan() {
        let command = argv(&["cargo", "test", "--test", "{plan}", "--", "--plan={plan}"]);
        assert_eq!(
            CommandExecutor::render(&command, Some("UnitTestPlan")),
            argv(&["cargo", "test", "--test", "UnitTestPlan", "--", "--plan=UnitTestPlan"])
        );
        assert_eq!(
            CommandExecutor::render(&command, None),
            argv(&["cargo", "test", "--test", "--"])
        );
    }

    #[test]
    fn test_empty_test_command_rejected() {
        assert!(CommandExecutor::new(CommandConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_run_plan_reads_metrics_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("UnitTestPlan.json"),
            r#"{"coverage": {"covered_lines": 9, "executable_lines": 10},
                "counts": {"total": 4, "passed": 4, "failed": 0, "skipped": 0}}"#,
        )
        .expect("write metrics");

        let executor = CommandExecutor::new(CommandConfig {
            test_command: argv(&["echo", "running {plan}"]),
            metrics_dir: Some(dir.path().to_path_buf()),
            ..CommandConfig::default()
        })
        .expect("config");

        let output = executor
            .run_plan("UnitTestPlan", Duration::from_secs(30))
            .await
            .expect("run failed");
        assert!(output.success);
        assert!(output.stdout.contains("running UnitTestPlan"));
        assert_eq!(output.coverage.map(|c| c.percentage()), Some(90.0));
        assert_eq!(output.counts.map(|c| c.total), Some(4));
        assert!(output.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_metrics_file_warns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let executor = CommandExecutor::new(CommandConfig {
            test_command: argv(&["false"]),
            metrics_dir: Some(dir.path().to_path_buf()),
            ..CommandConfig::default()
        })
        .expect("config");

        let output = executor
            .run_plan("IntegrationTestPlan", Duration::from_secs(30))
            .await
            .expect("run failed");
        assert!(!output.success);
        assert!(output.coverage.is_none());
        assert!(output.warnings[0].starts_with("No metrics file"));
        assert!(output.errors[0].contains("exited with code 1"));
    }

    #[tokio::test]
    async fn test_metrics_file_with_unknown_key_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("UnitTestPlan.json");
        std::fs::write(&path, r#"{"coverag": {"covered_lines": 9, "executable_lines": 10}}"#)
            .expect("write metrics");

        let message = read_metrics_file(&path).await.expect_err("must reject");
        assert!(message.starts_with("Malformed metrics file"));
        assert!(message.contains("coverag"));
    }

    #[tokio::test]
    async fn test_command_timeout_is_gate_timeout() {
        let executor = CommandExecutor::new(CommandConfig {
            test_command: argv(&["sleep", "5"]),
            ..CommandConfig::default()
        })
        .expect("config");

        let err = executor
            .run_plan("SlowPlan", Duration::from_millis(100))
            .await
            .expect_err("expected timeout");
        assert!(err
            .downcast_ref::<GateError>()
            .is_some_and(GateError::is_timeout));
    }
}
