//! Application error types.

use std::fmt;

use crate::config::ConfigFileError;
use crate::tracking::TrackingError;

/// Errors that can occur during application lifecycle.
#[derive(Debug)]
pub enum AppError {
    /// No map provider access token in config.ini or the environment.
    MissingAccessToken,

    /// Failed to load config.ini.
    ConfigFile(ConfigFileError),

    /// Configuration value rejected at startup.
    Config(String),

    /// The tracking session failed.
    Session(TrackingError),

    /// The session task panicked or was aborted.
    TaskFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MissingAccessToken => {
                write!(f, "Map access token is not configured")
            }
            AppError::ConfigFile(e) => {
                write!(f, "Failed to load configuration: {}", e)
            }
            AppError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            AppError::Session(e) => {
                write!(f, "Tracking session failed: {}", e)
            }
            AppError::TaskFailed(msg) => {
                write!(f, "Tracking task failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::ConfigFile(e) => Some(e),
            AppError::Session(e) => Some(e),
            AppError::MissingAccessToken | AppError::Config(_) | AppError::TaskFailed(_) => None,
        }
    }
}

impl From<ConfigFileError> for AppError {
    fn from(e: ConfigFileError) -> Self {
        AppError::ConfigFile(e)
    }
}

impl From<TrackingError> for AppError {
    fn from(e: TrackingError) -> Self {
        AppError::Session(e)
    }
}
