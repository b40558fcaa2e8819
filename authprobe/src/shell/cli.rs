//! # Authprobe CLI
//!
//! Command-line interface definition and main entry point.

use crate::config::HarnessConfig;
use crate::loopback::LoopbackIdentity;
use crate::pump::{RuntimePump, shutdown_on_ctrl_c};
use crate::report::{RunLedger, RunSummary};
use crate::scenarios::{self, Harness};
use crate::utils::logging::init_logging;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Output format for the run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Authprobe: drives an identity service through its sign-in, account and
/// token flows and reports every outcome.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = "authprobe runs every scenario against the in-process loopback
identity service and prints a pass/fail summary.

Example: authprobe --config authprobe.toml --format json
Example: authprobe --tick-ms 20 --latency-ms 5 --log-to-stderr"
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Event pump tick size in milliseconds (overrides the config file)
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Loopback request latency in milliseconds (overrides the config file)
    #[arg(long)]
    pub latency_ms: Option<u64>,

    /// Keep running after the scenarios until Ctrl-C
    #[arg(long)]
    pub linger: bool,

    /// Output format for the run summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log to stderr instead of file
    #[arg(long)]
    pub log_to_stderr: bool,
}

/// Load the config file (if any), then apply command-line overrides.
pub fn resolve_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    if let Some(tick_ms) = cli.tick_ms {
        config.tick_ms = tick_ms;
    }
    if let Some(latency_ms) = cli.latency_ms {
        config.loopback.latency_ms = latency_ms;
    }
    if cli.linger {
        config.linger = true;
    }
    config.validate()?;
    Ok(config)
}

/// Run every scenario against a fresh loopback service.
///
/// Cancelling `shutdown` stops the run at the next tick; the summary then
/// records that shutdown was requested.
pub async fn execute(config: &HarnessConfig, shutdown: CancellationToken) -> RunSummary {
    let ledger = Arc::new(RunLedger::new());
    let service = Arc::new(LoopbackIdentity::with_provider_id(
        config.latency(),
        config.loopback.provider_id.clone(),
    ));
    let pump = RuntimePump::new(shutdown);
    let mut harness = Harness::new(pump, ledger.clone(), service, config);

    let interrupted = scenarios::run_all(&mut harness).await.is_err();
    if interrupted {
        tracing::warn!("Run interrupted by shutdown request");
    } else if config.linger {
        harness.linger().await;
    }

    let pump = harness.into_pump();
    tracing::debug!("Event pump ran {} ticks", pump.ticks());
    ledger.summary(interrupted)
}

/// Main entry point for the authprobe binary.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    init_logging(log_level, !cli.log_to_stderr)?;

    let config = resolve_config(&cli)?;
    tracing::info!(
        "Starting run: tick {}ms, settle {}ms, loopback latency {}ms",
        config.tick_ms,
        config.settle_ms,
        config.loopback.latency_ms
    );

    let shutdown = CancellationToken::new();
    let signal_task = shutdown_on_ctrl_c(shutdown.clone());
    let summary = execute(&config, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(e) = signal_task.await {
        tracing::debug!("Ctrl-C task ended abnormally: {}", e);
    }

    match cli.format {
        OutputFormat::Text => print!("{summary}"),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serializing run summary")?
        ),
    }

    ensure_success(&summary)
}

/// Turn an interrupted or failing run into an error, and so a non-zero exit.
pub fn ensure_success(summary: &RunSummary) -> Result<()> {
    if summary.shutdown_requested {
        bail!("run interrupted after {} checks", summary.checks);
    }
    if summary.failed > 0 {
        bail!("{} of {} checks failed", summary.failed, summary.checks);
    }
    Ok(())
}
