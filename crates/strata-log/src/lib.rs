//! Structured logging for the strata encoder.
//!
//! Console output with uptime, level and module path via `tracing`, plus an
//! optional JSON log file for batch runs whose output is inspected later.

use std::path::{Path, PathBuf};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor a level is given.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file inside the log directory.
pub const LOG_FILE_NAME: &str = "strata.log";

/// Initialize the tracing subscriber.
///
/// Sets up structured logging with:
/// - Console output with uptime, module paths, and severity levels
/// - A JSON file `strata.log` in `log_dir` when `json_file` is set
/// - Environment-based filtering (`RUST_LOG` wins over `level`)
///
/// Call once per process.
///
/// # Examples
///
/// ```no_run
/// use strata_log::init_logging;
///
/// // Console only
/// init_logging(None, false, None);
///
/// // Console plus ./logs/strata.log at debug level
/// init_logging(Some(std::path::Path::new("./logs")), true, Some("debug"));
/// ```
pub fn init_logging(log_dir: Option<&Path>, json_file: bool, level: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if json_file
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_file_path(log_dir))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Filter for an explicit level string, falling back to [`DEFAULT_FILTER`]
/// when it is missing or empty.
pub fn level_filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) if !level.trim().is_empty() => EnvFilter::new(level),
        _ => default_env_filter(),
    }
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// Path of the JSON log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}
