//! User configuration.
//!
//! `~/.trailfix/config.ini` holds the map access token and the tracking
//! and BLE tunables. A missing file means defaults; a present file is
//! validated key by key.

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError, ACCESS_TOKEN_ENV};
pub use settings::{
    BleSettings, ConfigFile, LoggingSettings, MapSettings, TrackingSettings,
    DEFAULT_CAMERA_ANIMATION_MS, DEFAULT_LOG_DIRECTORY, DEFAULT_LOG_FILE, DEFAULT_MAP_STYLE,
    DEFAULT_SCAN_WINDOW_SECS, DEFAULT_SEED_LATITUDE, DEFAULT_SEED_LONGITUDE,
};
pub use writer::to_config_string;
