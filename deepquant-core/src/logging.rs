//! Logging for deepquant
//!
//! One daily-rotated file under `$XDG_STATE_HOME/deepquant/`. The configured
//! level applies to this workspace's crates only; the HTTP stack (reqwest,
//! hyper, rustls) stays at `warn`. `RUST_LOG`, when set, replaces these
//! directives entirely.
//!
//! Useful fields when reading the log: `thread_id` (turn lifecycle),
//! `message_id` and `event_type` (ingest), `research_id` (research tracking).

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

/// Crates whose events follow the configured level
const OWN_TARGETS: &[&str] = &["deepquant_core", "deepquant"];

/// Install the file logger. Keep the guard alive for the life of the process.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("deepquant.log")
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log file: {}", e)))?;
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_or(&filter_directives(&config.level)))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install logger: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );
    Ok(LoggingGuard { _guard: guard })
}

/// Route logs to the test harness, at `debug` for this crate so dropped
/// events and turn transitions show up next to a failing assertion.
/// Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_or(&filter_directives("debug")))
        .with_test_writer()
        .without_time()
        .try_init();
}

/// Filter directives for `level`: own crates at `level`, everything else
/// at `warn`.
pub fn filter_directives(level: &str) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|t| format!("{}={}", t, level)));
    directives.join(",")
}

fn env_or(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Flushes buffered log lines when dropped
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Current log file name prefix; rotated files carry a date suffix.
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
