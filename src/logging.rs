//! Logging setup for the supervisor and the one-shot subcommands.
//!
//! The long-running `start` mode writes structured JSON to a daily-rotated
//! file and mirrors a human-readable stream to stderr. One-shot subcommands
//! log to stderr only. Filtering follows `RUST_LOG` when set.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log file name stem; the daily roller appends the date.
const LOG_FILE_PREFIX: &str = "chainward.log";

fn default_filter() -> EnvFilter {
    // The status poller talks HTTP every few seconds; keep that stack quiet
    // unless RUST_LOG asks for it.
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"))
}

/// Set up logging for supervision: a JSON file layer with daily rotation
/// under `logs_dir` plus a plain stderr layer.
///
/// The returned guard owns the background log writer and must live until
/// process exit; dropping it flushes buffered entries.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created.
pub fn init_supervisor(logs_dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(default_filter())
        .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(guard)
}

/// Stderr-only logging for the one-shot subcommands.
pub fn init_cli() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
