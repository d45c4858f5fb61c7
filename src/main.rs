//! Chainward CLI entry point.
//!
//! Provides `start`, `check`, and `status` subcommands for running the
//! supervisor, validating a deployment, and inspecting the published
//! status report.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use chainward::config::{config_dir, default_config_path, load_config};
use chainward::metrics;
use chainward::supervisor::Supervisor;
use chainward::watcher::StatusClient;

/// Chainward — supervisor process for a blockchain node daemon.
#[derive(Parser)]
#[command(name = "chainward", version, about)]
struct Cli {
    /// Path to chainward.toml. Defaults to `~/.chainward/chainward.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the supervisor.
    Start,
    /// Validate the configuration and probe the daemon RPC once.
    Check,
    /// Print the latest published status report.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    match cli.command {
        Command::Start => handle_start(&config_path).await,
        Command::Check => handle_check(&config_path).await,
        Command::Status => handle_status(&config_path),
    }
}

/// Run the supervisor until externally terminated.
async fn handle_start(config_path: &Path) -> anyhow::Result<()> {
    let root = config_dir()?;
    std::fs::create_dir_all(&root)
        .with_context(|| format!("failed to create {}", root.display()))?;

    // Set up production logging (JSON file + stderr).
    let logs_dir = root.join("logs");
    let _logging_guard = chainward::logging::init_supervisor(&logs_dir)?;

    let config = load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    info!(
        config = %config_path.display(),
        binary = %config.daemon.binary.display(),
        "chainward supervisor started"
    );

    let mut supervisor = Supervisor::initialize(&config)?;
    supervisor.run().await;

    anyhow::bail!("supervision ended unexpectedly")
}

/// Validate the configuration and probe the daemon RPC once.
async fn handle_check(config_path: &Path) -> anyhow::Result<()> {
    chainward::logging::init_cli();

    let config = load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    println!("config ok: {}", config_path.display());

    let client = StatusClient::new(
        &config.daemon.rpc_base_url(),
        Duration::from_secs(config.checks.poll_timeout_secs),
    );
    match client.fetch_info().await {
        Ok(daemon_info) => println!(
            "daemon reachable: height {} of {}, difficulty {}, synced {}",
            daemon_info.height, daemon_info.network_height, daemon_info.difficulty, daemon_info.synced
        ),
        Err(e) => println!("daemon unreachable: {e:#}"),
    }

    Ok(())
}

/// Print the latest published status report.
fn handle_status(config_path: &Path) -> anyhow::Result<()> {
    chainward::logging::init_cli();

    let config = load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let Some(path) = config.metrics.status_file else {
        anyhow::bail!("no metrics.status_file configured, nothing to report");
    };

    let report = metrics::read_status_report(&path)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
