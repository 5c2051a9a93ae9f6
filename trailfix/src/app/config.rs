//! Application configuration for TrailfixApp.
//!
//! `AppConfig` is the validated, typed form of `ConfigFile`: everything
//! needed to bootstrap a tracking session, plus the map credentials the
//! host map widget needs before the engine may be constructed.

use std::time::Duration;

use crate::config::ConfigFile;
use crate::geo::GeoPoint;
use crate::tracking::SessionConfig;

use super::error::AppError;

/// Top-level configuration passed to `TrailfixApp::start()`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Map provider access token.
    pub access_token: String,

    /// Offline map style name.
    pub map_style: String,

    /// Tracking session settings.
    pub session: SessionConfig,
}

impl AppConfig {
    /// Build from a loaded config file.
    ///
    /// # Errors
    ///
    /// `AppError::MissingAccessToken` when no token is configured; the
    /// tracking engine must not be constructed in that case.
    pub fn from_config_file(file: &ConfigFile) -> Result<Self, AppError> {
        let access_token = file
            .map
            .access_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or(AppError::MissingAccessToken)?;

        let seed = GeoPoint::new(file.tracking.seed_latitude, file.tracking.seed_longitude)
            .map_err(|e| AppError::Config(format!("invalid seed position: {}", e)))?;

        let mut session = SessionConfig::new(seed);
        session.distance_threshold_m = file.tracking.distance_threshold_m;
        session.follow_mode = file.tracking.follow_mode;
        session.camera_animation = Duration::from_millis(file.tracking.camera_animation_ms);
        session.scan_window = Duration::from_secs(file.ble.scan_window_secs);
        session.service_uuid = file.ble.service_uuid.clone();
        session.characteristic_uuid = file.ble.characteristic_uuid.clone();

        Ok(Self {
            access_token,
            map_style: file.map.style.clone(),
            session,
        })
    }

    /// Token with all but the last four characters masked, for display.
    pub fn masked_token(&self) -> String {
        let visible: String = self
            .access_token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_is_fatal() {
        let file = ConfigFile::default();
        assert!(matches!(
            AppConfig::from_config_file(&file),
            Err(AppError::MissingAccessToken)
        ));
    }

    #[test]
    fn test_blank_token_is_fatal() {
        let mut file = ConfigFile::default();
        file.map.access_token = Some("   ".to_string());
        assert!(matches!(
            AppConfig::from_config_file(&file),
            Err(AppError::MissingAccessToken)
        ));
    }

    #[test]
    fn test_session_settings_carried_over() {
        let mut file = ConfigFile::default();
        file.map.access_token = Some("pk.secret1234".to_string());
        file.tracking.follow_mode = true;
        file.tracking.camera_animation_ms = 250;
        file.ble.scan_window_secs = 3;

        let config = AppConfig::from_config_file(&file).unwrap();
        assert!(config.session.follow_mode);
        assert_eq!(config.session.camera_animation, Duration::from_millis(250));
        assert_eq!(config.session.scan_window, Duration::from_secs(3));
        assert_eq!(config.session.seed.latitude(), 6.9271);
        assert_eq!(config.map_style, "outdoors");
        assert_eq!(config.masked_token(), "****1234");
    }

    #[test]
    fn test_invalid_seed() {
        let mut file = ConfigFile::default();
        file.map.access_token = Some("pk".to_string());
        file.tracking.seed_longitude = 200.0;
        assert!(matches!(
            AppConfig::from_config_file(&file),
            Err(AppError::Config(_))
        ));
    }
}
