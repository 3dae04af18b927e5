//! testgate - test plan orchestration and quality gate CLI
//!
//! ## Commands
//!
//! - `run`: execute test plans, validate quality gates, write the report
//! - `thresholds`: print the effective threshold registry
//! - `show-report`: verify and print a stored report artifact

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use uuid::Uuid;

use testgate_ci::{
    BuildStrategy, CommandConfig, CommandExecutor, ExecutionMode, OrchestratorConfig,
    ValidationPipeline,
};
use testgate_core::{
    read_report_artifact, render_summary, write_report_artifact, write_report_json, GateError,
    GateMetrics, ThresholdOverrides, ThresholdRegistry,
};

const DEFAULT_PLANS: &str = "UnitTestPlan,IntegrationTestPlan,PerformanceTestPlan,SecurityTestPlan";

#[derive(Parser)]
#[command(name = "testgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run test plans and enforce quality gates", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Threshold selection shared by `run` and `thresholds`.
#[derive(clap::Args, Debug, Default)]
struct ThresholdArgs {
    /// Use strict thresholds
    #[arg(long, env = "TESTGATE_STRICT")]
    strict: bool,

    /// Threshold override as name=value (repeatable)
    #[arg(long = "threshold", value_name = "NAME=VALUE")]
    thresholds: Vec<String>,

    /// Threshold override file (.json or .toml)
    #[arg(long, env = "TESTGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute test plans and evaluate quality gates
    ///
    /// Exits 0 when the run is deployable, 1 otherwise.
    Run {
        /// Comma-separated test plan ids
        #[arg(long, default_value = DEFAULT_PLANS, env = "TESTGATE_PLANS")]
        plans: String,

        /// Run plans one after another instead of concurrently
        #[arg(long)]
        sequential: bool,

        #[command(flatten)]
        threshold_args: ThresholdArgs,

        /// JSON file with externally measured gate metrics
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Write the report JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Store the report with a digest under <DIR>/<run_id>/
        #[arg(long, env = "TESTGATE_ARTIFACTS_DIR")]
        artifacts_dir: Option<PathBuf>,

        /// Working directory for build and test commands
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Build command; `{plan}` is replaced by the plan id
        #[arg(long, env = "TESTGATE_BUILD_CMD")]
        build_cmd: Option<String>,

        /// Test command; `{plan}` is replaced by the plan id
        #[arg(long, env = "TESTGATE_TEST_CMD", default_value = "cargo test --test {plan}")]
        test_cmd: String,

        /// Directory where the test command writes <plan>.json metrics
        #[arg(long, env = "TESTGATE_METRICS_DIR")]
        metrics_dir: Option<PathBuf>,

        /// Per-plan test timeout in seconds
        #[arg(long, default_value = "1800")]
        plan_timeout: u64,

        /// Per-plan build timeout in seconds
        #[arg(long, default_value = "600")]
        build_timeout: u64,

        /// Overall run budget in seconds
        #[arg(long)]
        run_timeout: Option<u64>,

        /// Maximum plans in flight in concurrent mode
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// When to run the build command
        #[arg(long, value_enum, default_value = "per-plan")]
        build_strategy: BuildStrategyArg,
    },

    /// Print the effective thresholds
    Thresholds {
        #[command(flatten)]
        threshold_args: ThresholdArgs,
    },

    /// Verify and print a stored report artifact
    ShowReport {
        /// Run ID of the report
        #[arg(long)]
        run: Uuid,

        /// Root directory containing report artifacts
        #[arg(long, env = "TESTGATE_ARTIFACTS_DIR", default_value = ".testgate/reports")]
        artifacts_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BuildStrategyArg {
    PerPlan,
    Once,
}

impl From<BuildStrategyArg> for BuildStrategy {
    fn from(arg: BuildStrategyArg) -> Self {
        match arg {
            BuildStrategyArg::PerPlan => BuildStrategy::PerPlan,
            BuildStrategyArg::Once => BuildStrategy::Once,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    testgate_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            plans,
            sequential,
            threshold_args,
            metrics,
            output,
            artifacts_dir,
            workdir,
            build_cmd,
            test_cmd,
            metrics_dir,
            plan_timeout,
            build_timeout,
            run_timeout,
            max_concurrent,
            build_strategy,
        } => {
            let orchestrator_config = OrchestratorConfig {
                plan_timeout: Duration::from_secs(plan_timeout),
                build_timeout: Duration::from_secs(build_timeout),
                run_timeout: run_timeout.map(Duration::from_secs),
                max_concurrent,
                build_strategy: build_strategy.into(),
            };
            let command_config = CommandConfig {
                workdir,
                build_command: build_cmd.as_deref().map(CommandConfig::split),
                test_command: CommandConfig::split(&test_cmd),
                metrics_dir,
            };
            let mode = if sequential {
                ExecutionMode::Sequential
            } else {
                ExecutionMode::Concurrent
            };
            let exit_code = cmd_run(
                &plans,
                mode,
                &threshold_args,
                metrics.as_deref(),
                output.as_deref(),
                artifacts_dir.as_deref(),
                command_config,
                orchestrator_config,
            )
            .await?;
            std::process::exit(exit_code);
        }
        Commands::Thresholds { threshold_args } => cmd_thresholds(&threshold_args, cli.json),
        Commands::ShowReport { run, artifacts_dir } => cmd_show_report(&run, &artifacts_dir),
    }
}

fn parse_plans(plans: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = plans
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        anyhow::bail!("No test plans given");
    }
    Ok(ids)
}

/// Build the registry: defaults (or strict), then the config file, then
/// command-line pairs.
fn build_registry(args: &ThresholdArgs) -> Result<ThresholdRegistry> {
    let mut overrides = ThresholdOverrides::new();
    if let Some(path) = &args.config {
        let from_file = ThresholdOverrides::load(path)
            .with_context(|| format!("Failed to load thresholds from {}", path.display()))?;
        overrides = overrides.merged_with(&from_file);
    }
    overrides = overrides.merged_with(&ThresholdOverrides::parse_pairs(&args.thresholds)?);

    let registry = if args.strict {
        ThresholdRegistry::strict(&overrides)?
    } else {
        ThresholdRegistry::with_overrides(&overrides)?
    };
    Ok(registry)
}

fn load_metrics(path: Option<&Path>) -> Result<GateMetrics> {
    let Some(path) = path else {
        return Ok(GateMetrics::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metrics file {}", path.display()))?;
    let metrics = serde_json::from_str(&content).map_err(|e| {
        GateError::Config(format!("invalid metrics file {}: {e}", path.display()))
    })?;
    Ok(metrics)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    plans: &str,
    mode: ExecutionMode,
    threshold_args: &ThresholdArgs,
    metrics: Option<&Path>,
    output: Option<&Path>,
    artifacts_dir: Option<&Path>,
    command_config: CommandConfig,
    orchestrator_config: OrchestratorConfig,
) -> Result<i32> {
    // Configuration problems are fatal before any plan runs
    let plan_ids = parse_plans(plans)?;
    let registry = build_registry(threshold_args)?;
    let extra = load_metrics(metrics)?;
    let executor = Arc::new(CommandExecutor::new(command_config)?);

    println!("Running {} test plan(s) ({})", plan_ids.len(), mode.as_str());
    println!("Plans: {}", plan_ids.join(", "));
    println!();

    let pipeline = ValidationPipeline::new(executor, registry, orchestrator_config);
    let report = pipeline
        .run(&plan_ids, mode, extra)
        .await
        .context("Validation run failed")?;

    print!("{}", render_summary(&report));

    if let Some(path) = output {
        write_report_json(path, &report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }
    if let Some(dir) = artifacts_dir {
        let path = write_report_artifact(&report, dir)
            .with_context(|| format!("Failed to store report under {}", dir.display()))?;
        println!("Report artifact stored at {}", path.display());
    }

    info!(run_id = %report.run_id, success = report.overall_success, "run complete");
    println!(
        "\n{}",
        if report.overall_success {
            "✓ READY FOR DEPLOYMENT"
        } else {
            "✗ NOT READY FOR DEPLOYMENT"
        }
    );
    Ok(report.exit_code())
}

fn cmd_thresholds(args: &ThresholdArgs, json: bool) -> Result<()> {
    let registry = build_registry(args)?;

    if json {
        let thresholds: Vec<_> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&thresholds)?);
        return Ok(());
    }

    println!(
        "Thresholds ({}):",
        if args.strict { "strict" } else { "standard" }
    );
    for threshold in registry.iter() {
        println!(
            "  {:<34} {} {:<10} {}",
            threshold.key,
            threshold.polarity.symbol(),
            threshold.format_value(threshold.value),
            if threshold.critical { "critical" } else { "" }
        );
    }
    Ok(())
}

fn cmd_show_report(run_id: &Uuid, artifacts_dir: &Path) -> Result<()> {
    let report = read_report_artifact(run_id, artifacts_dir)
        .with_context(|| format!("Failed to load report {run_id}"))?;
    print!("{}", render_summary(&report));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use testgate_core::keys;

    #[test]
    fn test_cli_parses_run_defaults() {
        let cli = Cli::try_parse_from(["testgate", "run"]).expect("parse failed");
        match cli.command {
            Commands::Run {
                plans,
                sequential,
                plan_timeout,
                build_strategy,
                ..
            } => {
                assert_eq!(plans, DEFAULT_PLANS);
                assert!(!sequential);
                assert_eq!(plan_timeout, 1800);
                assert_eq!(build_strategy, BuildStrategyArg::PerPlan);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parses_repeated_thresholds() {
        let cli = Cli::try_parse_from([
            "testgate",
            "thresholds",
            "--threshold",
            "overall_test_coverage=85",
            "--threshold",
            "test_flaky_rate=3",
        ])
        .expect("parse failed");
        match cli.command {
            Commands::Thresholds { threshold_args } => {
                assert_eq!(threshold_args.thresholds.len(), 2);
            }
            _ => panic!("expected thresholds"),
        }
    }

    #[test]
    fn test_parse_plans() {
        assert_eq!(
            parse_plans(" UnitTestPlan, ,SecurityTestPlan ").expect("parse"),
            vec!["UnitTestPlan", "SecurityTestPlan"]
        );
        assert!(parse_plans(" , ").is_err());
    }

    #[test]
    fn test_build_registry_layers_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("gates.toml");
        std::fs::write(
            &config,
            "[thresholds]\noverall_test_coverage = 85.0\ntest_flaky_rate = 4.0\n",
        )
        .expect("write config");

        let args = ThresholdArgs {
            strict: true,
            thresholds: vec!["test_flaky_rate=3".to_string()],
            config: Some(config),
        };
        let registry = build_registry(&args).expect("registry");

        // file beats strict, command line beats file
        let value = |key: &str| registry.get(key).expect("threshold").value;
        assert_eq!(value(keys::OVERALL_TEST_COVERAGE), 85.0);
        assert_eq!(value(keys::TEST_FLAKY_RATE), 3.0);
        assert_eq!(value(keys::MAX_TEST_EXECUTION_TIME), 30.0);
    }

    #[test]
    fn test_build_registry_rejects_unknown_threshold() {
        let args = ThresholdArgs {
            thresholds: vec!["coverage_of_everything=1".to_string()],
            ..ThresholdArgs::default()
        };
        assert!(build_registry(&args).is_err());
    }

    #[test]
    fn test_load_metrics_defaults_when_absent() {
        assert_eq!(load_metrics(None).expect("metrics"), GateMetrics::default());
    }

    #[test]
    fn test_load_metrics_rejects_misspelled_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, r#"{"critical_vulnerabilites": 7}"#).expect("write");

        let err = load_metrics(Some(&path)).expect_err("misspelled key must fail");
        assert!(matches!(
            err.downcast_ref::<GateError>(),
            Some(GateError::Config(_))
        ));
        assert!(err.to_string().contains("critical_vulnerabilites"));
    }
}
