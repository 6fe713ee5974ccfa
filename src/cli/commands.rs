//! CLI command definitions for marketpulse.
//!
//! Two commands: `modules` lists the registered data modules and their
//! availability, `run` executes a pipeline run and writes the aggregated
//! report.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::config::Settings;
use crate::modules::{ModuleConfig, ModuleRegistry};
use crate::pipeline::aggregate::AggregatedResult;
use crate::pipeline::progress::ProgressTracker;
use crate::pipeline::types::{ModuleStatus, RunRequest};
use crate::pipeline::PipelineOrchestrator;

/// How often the progress monitor logs a status line.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Labor-market data collection pipeline.
#[derive(Parser)]
#[command(name = "marketpulse")]
#[command(about = "Collect labor-market intelligence from jobs, courses, trends and skills APIs")]
#[command(version)]
#[command(
    long_about = "marketpulse runs a configurable subset of data-collection modules \
concurrently against one topic and aggregates their results into a single JSON report.\n\n\
Example usage:\n  marketpulse run --topic \"data analyst\" --modules jobs,trends --output report.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run a pipeline for one topic.
    Run(RunArgs),

    /// List available data modules.
    #[command(alias = "ls")]
    Modules(ModulesArgs),
}

/// Arguments for `marketpulse run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Topic to collect data about (e.g. "data analyst").
    #[arg(short, long)]
    pub topic: String,

    /// Comma-separated module ids to run (default: every available module).
    #[arg(short, long)]
    pub modules: Option<String>,

    /// JSON file with per-module configuration, keyed by module id.
    #[arg(short, long)]
    pub inputs: Option<String>,

    /// Per-module timeout in seconds, applied to every selected module.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Maximum modules running concurrently (default: from settings).
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// File to write the aggregated JSON report to.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Print the full JSON report to stdout instead of a summary.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `marketpulse modules`.
#[derive(Parser, Debug)]
pub struct ModulesArgs {
    /// Output the module list as JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Parse CLI arguments without executing a command.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args).await?,
        Commands::Modules(args) => run_modules_command(args)?,
    }
    Ok(())
}

fn run_modules_command(args: ModulesArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let registry = ModuleRegistry::builtin(&settings);
    let infos = registry.describe();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("Available modules:\n");
    for info in infos {
        let marker = if info.available { "+" } else { "-" };
        println!("  [{}] {:<10} {}", marker, info.id, info.display_name);
        println!("      {}", info.description);
        if let Some(message) = info.availability_message {
            println!("      unavailable: {}", message);
        }
        println!();
    }
    Ok(())
}

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    let mut settings = Settings::from_env()?;
    if let Some(max_parallel) = args.max_parallel {
        settings = settings.with_max_parallel_modules(max_parallel);
        settings.validate()?;
    }

    let registry = Arc::new(ModuleRegistry::builtin(&settings));
    let modules = select_modules(args.modules.as_deref(), &registry)?;
    let inputs = match &args.inputs {
        Some(path) => load_inputs(path)?,
        None => BTreeMap::new(),
    };

    let mut request = RunRequest::new(args.topic.clone(), modules.clone());
    request.inputs = inputs;
    if let Some(secs) = args.timeout_secs {
        for id in &modules {
            request = request.with_timeout(id, Duration::from_secs(secs));
        }
    }

    let orchestrator = PipelineOrchestrator::new(registry, &settings);
    let handle = orchestrator
        .start_run(request)
        .await
        .context("failed to start pipeline run")?;

    // Ctrl-C cancels the run instead of killing the process outright, so
    // modules get their grace period and the partial report is written.
    let cancel = handle.cancel_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let monitor = tokio::spawn(monitor_progress(handle.progress()));
    let result = handle.wait().await?;
    monitor.abort();

    let report = serde_json::to_string_pretty(&result)?;
    if let Some(path) = &args.output {
        fs::write(path, &report).with_context(|| format!("failed to write report to {}", path))?;
        info!(path, "Report written");
    }

    if args.json {
        println!("{}", report);
    } else {
        print_summary(&result);
    }
    Ok(())
}

/// Logs a status line for every non-terminal module until the run ends.
async fn monitor_progress(tracker: ProgressTracker) {
    loop {
        tokio::time::sleep(PROGRESS_INTERVAL).await;
        let snapshot = tracker.snapshot().await;
        if snapshot.status.is_terminal() {
            break;
        }

        for state in snapshot.modules.values() {
            if state.status.is_terminal() {
                continue;
            }
            let latest = state
                .messages
                .last()
                .map(|m| m.text.as_str())
                .unwrap_or("waiting for a slot");
            info!(module = %state.id, status = %state.status, "{}", latest);
        }
    }
}

/// Resolves the `--modules` selection, defaulting to every available module.
fn select_modules(
    selection: Option<&str>,
    registry: &ModuleRegistry,
) -> anyhow::Result<Vec<String>> {
    match selection {
        Some(list) => {
            let modules: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            for id in &modules {
                if !registry.contains(id) {
                    anyhow::bail!(
                        "unknown module '{}' (available: {})",
                        id,
                        registry.ids().join(", ")
                    );
                }
            }
            Ok(modules)
        }
        None => {
            let modules: Vec<String> = registry
                .ids()
                .into_iter()
                .filter(|id| registry.available(id))
                .map(String::from)
                .collect();
            if modules.is_empty() {
                anyhow::bail!(
                    "no modules are available; configure credentials or select modules explicitly"
                );
            }
            Ok(modules)
        }
    }
}

/// Reads the per-module configuration file.
fn load_inputs(path: &str) -> anyhow::Result<BTreeMap<String, ModuleConfig>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read inputs file {}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("inputs file {} is not a JSON object of module configs", path))
}

fn print_summary(result: &AggregatedResult) {
    println!();
    println!("Run {} [{}]", result.run_id, result.outcome);
    println!("Topic: {}", result.topic);
    println!();

    for (id, report) in &result.modules {
        let detail = match report.status {
            ModuleStatus::Succeeded => {
                let rows: usize = report
                    .output
                    .as_ref()
                    .map(|o| o.total_rows())
                    .unwrap_or(0);
                format!("{} rows", rows)
            }
            _ => report
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_default(),
        };
        let duration = report
            .duration_ms
            .map(|ms| format!(" ({:.1}s)", ms as f64 / 1000.0))
            .unwrap_or_default();
        println!(
            "  {:<10} {:<10} {}{}",
            id, report.status, detail, duration
        );
    }
    println!();
    println!("Total rows collected: {}", result.total_rows());
}
