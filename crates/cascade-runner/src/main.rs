use anyhow::{Context, Result};
use cascade_runner::config::RunnerConfig;
use cascade_runner::endpoint::{ChatClient, EndpointExecutor, EndpointReviewer};
use cascade_runner::gate::CommandGate;
use cascade_runner::{exit_code, telemetry};
use clap::Parser;
use coordination::{CascadeController, RiskHint, Task};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run one task through the tier cascade and print its outcome as JSON.
#[derive(Parser, Debug)]
#[command(name = "cascade-runner", version)]
struct Args {
    /// Runner configuration (TOML)
    #[arg(long, default_value = "cascade.toml")]
    config: PathBuf,

    /// What the task should accomplish
    #[arg(long)]
    objective: String,

    /// JSON file with context passed through to executors
    #[arg(long)]
    context: Option<PathBuf>,

    /// Risk hint: low, medium, high or critical
    #[arg(long)]
    risk: Option<RiskHint>,

    /// Append the outcome to this JSONL file (overrides config)
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Skip independent review even where tiers name a reviewer
    #[arg(long)]
    no_review: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = RunnerConfig::load(&args.config)?;
    let ladder = config.ladder().context("Invalid tier ladder")?;
    let endpoints = config.endpoints()?;

    let client = ChatClient::new();
    let executor = Arc::new(EndpointExecutor::new(client.clone(), endpoints.clone()));
    let gate = Arc::new(CommandGate::from_config(&config)?);
    let mut controller = CascadeController::new(config.cascade_config(), executor, gate)?;
    let wants_review = ladder.tiers().iter().any(|t| t.reviewer_rank.is_some());
    if wants_review && !args.no_review {
        controller = controller.with_review_gate(Arc::new(EndpointReviewer::new(client, endpoints)));
    }

    let mut task = Task::new(args.objective);
    if let Some(path) = &args.context {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context {}", path.display()))?;
        let context: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Context {} is not valid JSON", path.display()))?;
        task = task.with_context(context);
    }
    if let Some(risk) = args.risk {
        task = task.with_risk(risk);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping at the next checkpoint");
            on_interrupt.cancel();
        }
    });

    info!(
        task_id = %task.id(),
        ladder = %ladder.summary(),
        checks = config.checks.len(),
        review = wants_review && !args.no_review,
        "Cascade runner starting"
    );
    let outcome = controller.run(task, &ladder, &cancel).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if let Some(path) = args.telemetry.as_ref().or(config.telemetry_path.as_ref()) {
        telemetry::append_outcome(&outcome, path);
    }

    Ok(ExitCode::from(exit_code(&outcome)))
}
