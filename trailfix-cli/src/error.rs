//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use trailfix::app::AppError;
use trailfix::config::{ConfigFileError, ACCESS_TOKEN_ENV};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start or run the tracking session
    App(AppError),
    /// Failed to read an input file
    FileRead { path: String, error: std::io::Error },
    /// Malformed line in a replay input file
    InvalidInput { path: String, line: usize, reason: String },
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Interactive prompt failed
    Prompt(String),
    /// Failed to build the async runtime or install the signal handler
    Runtime(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::App(AppError::MissingAccessToken) => {
                eprintln!();
                eprintln!("A map access token is required. Either:");
                eprintln!("  1. Set access_token in the [map] section of config.ini");
                eprintln!("  2. Export {}=<token>", ACCESS_TOKEN_ENV);
                eprintln!("Run 'trailfix config path' to locate config.ini");
            }
            CliError::InvalidInput { .. } => {
                eprintln!();
                eprintln!("Replay files hold one '<lat>,<lon>' fix per line.");
                eprintln!("Blank lines and lines starting with '#' are skipped.");
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
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::App(e) => write!(f, "{}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path, error)
            }
            CliError::InvalidInput { path, line, reason } => {
                write!(f, "{}:{}: {}", path, line, reason)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Prompt(msg) => write!(f, "Selection error: {}", msg),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::App(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<trailfix::tracking::TrackingError> for CliError {
    fn from(e: trailfix::tracking::TrackingError) -> Self {
        CliError::App(AppError::Session(e))
    }
}
