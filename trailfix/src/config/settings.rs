//! Settings structs for each `[section]` of config.ini, and their defaults.

use std::path::PathBuf;

use crate::ble::{GPS_NOTIFY_CHARACTERISTIC_UUID, GPS_SERVICE_UUID};
use crate::tracking::DEFAULT_DISTANCE_THRESHOLD_M;

/// Default map style name.
pub const DEFAULT_MAP_STYLE: &str = "outdoors";

/// Default camera animation in milliseconds.
pub const DEFAULT_CAMERA_ANIMATION_MS: u64 = 500;

/// Default seed (Colombo).
pub const DEFAULT_SEED_LATITUDE: f64 = 6.9271;
pub const DEFAULT_SEED_LONGITUDE: f64 = 79.8612;

/// Default BLE scan window in seconds.
pub const DEFAULT_SCAN_WINDOW_SECS: u64 = 10;

pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "trailfix.log";

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub map: MapSettings,
    pub tracking: TrackingSettings,
    pub ble: BleSettings,
    pub logging: LoggingSettings,
}

/// `[map]`
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    /// Map provider access token. Required to start.
    pub access_token: Option<String>,
    pub style: String,
}

/// `[tracking]`
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub distance_threshold_m: f64,
    pub follow_mode: bool,
    pub camera_animation_ms: u64,
    pub seed_latitude: f64,
    pub seed_longitude: f64,
}

/// `[ble]`
#[derive(Debug, Clone, PartialEq)]
pub struct BleSettings {
    pub scan_window_secs: u64,
    pub service_uuid: String,
    pub characteristic_uuid: String,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            map: MapSettings {
                access_token: None,
                style: DEFAULT_MAP_STYLE.to_string(),
            },
            tracking: TrackingSettings {
                distance_threshold_m: DEFAULT_DISTANCE_THRESHOLD_M,
                follow_mode: false,
                camera_animation_ms: DEFAULT_CAMERA_ANIMATION_MS,
                seed_latitude: DEFAULT_SEED_LATITUDE,
                seed_longitude: DEFAULT_SEED_LONGITUDE,
            },
            ble: BleSettings {
                scan_window_secs: DEFAULT_SCAN_WINDOW_SECS,
                service_uuid: GPS_SERVICE_UUID.to_string(),
                characteristic_uuid: GPS_NOTIFY_CHARACTERISTIC_UUID.to_string(),
            },
            logging: LoggingSettings {
                directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}
