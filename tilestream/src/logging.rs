//! Logging setup for tilestream.
//!
//! Structured logging to a log file and to stdout:
//! - Writes to `~/.tilestream/logs/tilestream.log` (cleared on session start)
//! - Compact single-line format on stdout
//! - Configurable via the RUST_LOG environment variable (default `info`)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::config_directory;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize logging.
///
/// Creates `log_dir` if needed, truncates `log_file` inside it and installs a
/// global subscriber writing to both the file and stdout.
///
/// # Errors
///
/// Returns an error if the log file cannot be prepared or a global
/// subscriber is already installed.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_names(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Default log directory (~/.tilestream/logs).
pub fn default_log_dir() -> PathBuf {
    config_directory().join("logs")
}

/// Default log file name.
pub fn default_log_file() -> &'static str {
    "tilestream.log"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert!(default_log_dir().ends_with(".tilestream/logs"));
        assert_eq!(default_log_file(), "tilestream.log");
    }

    #[test]
    fn test_creates_directory_and_truncates_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let log_dir = temp.path().join("nested").join("logs");
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join("test.log"), "previous session").unwrap();

        let guard = init_logging(&log_dir, "test.log");

        assert!(log_dir.join("test.log").exists());
        if guard.is_ok() {
            tracing::info!("first line");
        }
        drop(guard);
        let content = fs::read_to_string(log_dir.join("test.log")).unwrap();
        assert!(!content.contains("previous session"));
    }
}
