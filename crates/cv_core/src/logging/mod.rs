//! Logging infrastructure for CV analysis.
//!
//! The library itself only emits `tracing` events. Callers install a
//! subscriber once at startup with one of the init functions here.
//!
//! # Example
//!
//! ```no_run
//! use cv_core::logging::{init_tracing_with_file, LogLevel};
//!
//! // Keep the guard alive for the lifetime of the program
//! let _guard = init_tracing_with_file(LogLevel::Info, ".logs").unwrap();
//! tracing::info!("Starting analysis");
//! ```

mod types;

pub use types::LogLevel;

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Prefix of rolling log file names.
pub const LOG_FILE_PREFIX: &str = "cv_core";

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(env_filter(default_level))
        .init();
}

/// Initialize tracing to stderr plus a daily rolling file in `dir`.
///
/// File output goes through a non-blocking writer; the returned guard
/// flushes it on drop, so hold it until shutdown.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    dir: impl AsRef<Path>,
) -> io::Result<WorkerGuard> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(dir)
        .map_err(io::Error::other)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true),
        )
        .with(env_filter(default_level))
        .init();

    tracing::debug!("File logging to {}", dir.display());
    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)))
}

/// Convert LogLevel to filter string.
fn level_to_filter_str(level: LogLevel) -> &'static str {
    level.as_filter_str()
}
