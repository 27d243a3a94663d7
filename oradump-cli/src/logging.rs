//! Logging setup
//!
//! Console output plus a daily rolling `oradump` log file, both filtered by
//! `RUST_LOG` (default `oradump=info,oradump_runner=info`).

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "oradump=info,oradump_runner=info";

/// Installs the global subscriber
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for the rest of the process.
pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Error records go through this writer too; block instead of dropping lines
    let file_appender = tracing_appender::rolling::daily(log_dir, "oradump");
    let (file_writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(file_appender);

    let console_layer = fmt::layer().with_target(false).with_filter(filter());

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_thread_ids(true)
        .with_writer(file_writer)
        .with_filter(filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}
