//! CLI runner for common setup.
//!
//! Loads the config file and initializes logging once per command.

use tracing::info;
use trailfix::config::ConfigFile;
use trailfix::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Keeps the log writer alive while the command runs.
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// With `verbose`, log events are mirrored to stderr.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let logging_guard = init_logging(
            &config.logging.directory,
            &config.logging.file,
            verbose,
        )
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!(
            log = %self.logging_guard.path().display(),
            "Trailfix v{}",
            trailfix::VERSION
        );
        info!("Trailfix CLI: {} command", command);
    }
}
