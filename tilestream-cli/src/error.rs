//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use tilestream::config::ConfigError;
use tilestream::viewer::ViewerError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigError),
    /// Failed to build or run the viewer
    Viewer(ViewerError),
    /// Failed to install the Ctrl-C handler
    Signal(String),
    /// Nothing was presented before shutdown
    NoFrame,
    /// Failed to write the snapshot
    FileWrite { path: PathBuf, error: String },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the values in ~/.tilestream/config.ini or the");
                eprintln!("command-line overrides. The server URL needs a trailing '/'.");
            }
            CliError::Viewer(ViewerError::Transport(_)) => {
                eprintln!();
                eprintln!("The HTTP client could not be created; check your TLS setup.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Viewer(e) => write!(f, "Map viewer failed: {}", e),
            CliError::Signal(msg) => write!(f, "Failed to install Ctrl-C handler: {}", msg),
            CliError::NoFrame => write!(f, "No frame was rendered"),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write {}: {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<ViewerError> for CliError {
    fn from(e: ViewerError) -> Self {
        CliError::Viewer(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_file_write() {
        let err = CliError::FileWrite {
            path: PathBuf::from("/tmp/map.png"),
            error: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to write /tmp/map.png: permission denied"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: CliError = ConfigError::Inconsistent("tile size must be positive".into()).into();
        assert!(err.to_string().contains("tile size must be positive"));
    }
}
