//! Configuration file handling for ~/.trailfix/config.ini.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use super::settings::ConfigFile;

/// Environment variable that overrides `[map] access_token`.
pub const ACCESS_TOKEN_ENV: &str = "TRAILFIX_ACCESS_TOKEN";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load from ~/.trailfix/config.ini and apply environment overrides.
    pub fn load() -> Result<Self, ConfigFileError> {
        let mut config = Self::load_from(&config_file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save to a specific path, creating the parent directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// Apply `TRAILFIX_ACCESS_TOKEN` if set.
    pub fn apply_env_overrides(&mut self) {
        self.override_access_token(std::env::var(ACCESS_TOKEN_ENV).ok());
    }

    /// Replace the access token with a non-blank override.
    pub fn override_access_token(&mut self, token: Option<String>) {
        if let Some(token) = token {
            let token = token.trim();
            if !token.is_empty() {
                self.map.access_token = Some(token.to_string());
            }
        }
    }
}

/// ~/.trailfix
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trailfix")
}

/// ~/.trailfix/config.ini
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.map.access_token = Some("pk.test".to_string());
        config.tracking.follow_mode = true;
        config.tracking.distance_threshold_m = 12.5;
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_reports_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[ble]\nscan_window_secs = soon\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: ble.scan_window_secs = 'soon' - expected a number"
        );
    }

    #[test]
    fn test_token_override() {
        let mut config = ConfigFile::default();
        config.map.access_token = Some("from-file".to_string());

        config.override_access_token(Some("  ".to_string()));
        assert_eq!(config.map.access_token.as_deref(), Some("from-file"));

        config.override_access_token(Some("from-env".to_string()));
        assert_eq!(config.map.access_token.as_deref(), Some("from-env"));

        config.override_access_token(None);
        assert_eq!(config.map.access_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_config_path() {
        assert!(config_file_path().ends_with(".trailfix/config.ini"));
    }
}
