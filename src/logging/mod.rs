//! Logging initialization with environment-based formatters
//!
//! - Production: Structured JSON logs on stdout
//! - Sandbox: Colorful, human-readable logs on stdout
//! - Always: plain-text execution log, rotated daily, 30 files kept

use crate::config::is_production;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Rotated execution log files kept on disk
pub const RETAINED_LOG_FILES: usize = 30;

/// File name prefix of the execution log
pub const LOG_FILE_PREFIX: &str = "execution.log";

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub logs_dir: PathBuf,
    /// Default to `debug` instead of `info` when `RUST_LOG` is unset
    pub verbose: bool,
}

/// Initialize logging based on the environment.
///
/// Keep the returned guard alive for the whole run; dropping it flushes and
/// closes the execution log.
pub fn init_logging(
    options: &LoggingOptions,
) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    let default_level = if options.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(RETAINED_LOG_FILES)
        .build(&options.logs_dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer);

    let production = is_production();

    // Production: Structured JSON logs
    let json_layer = production.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stdout)
    });

    // Sandbox/Development: Colorful, human-readable logs
    let pretty_layer = (!production).then(|| {
        fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .with_writer(std::io::stdout)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()?;

    Ok(guard)
}
