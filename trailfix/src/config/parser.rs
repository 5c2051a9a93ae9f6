//! INI parsing: the single place where key names map to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::geo::GeoPoint;

/// Parse an `Ini` into a `ConfigFile`, overlaying found values on defaults.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [map]
    if let Some(section) = ini.section(Some("map")) {
        if let Some(v) = section.get("access_token") {
            let v = v.trim();
            if !v.is_empty() {
                config.map.access_token = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("style") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("map", "style", v, "must not be empty"));
            }
            config.map.style = v.to_string();
        }
    }

    // [tracking]
    if let Some(section) = ini.section(Some("tracking")) {
        if let Some(v) = section.get("distance_threshold_m") {
            let threshold: f64 = parse_number("tracking", "distance_threshold_m", v)?;
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(invalid(
                    "tracking",
                    "distance_threshold_m",
                    v,
                    "must be a non-negative number of meters",
                ));
            }
            config.tracking.distance_threshold_m = threshold;
        }
        if let Some(v) = section.get("follow_mode") {
            config.tracking.follow_mode = parse_bool(v);
        }
        if let Some(v) = section.get("camera_animation_ms") {
            config.tracking.camera_animation_ms =
                parse_number("tracking", "camera_animation_ms", v)?;
        }
        if let Some(v) = section.get("seed_latitude") {
            config.tracking.seed_latitude = parse_number("tracking", "seed_latitude", v)?;
        }
        if let Some(v) = section.get("seed_longitude") {
            config.tracking.seed_longitude = parse_number("tracking", "seed_longitude", v)?;
        }
        if let Err(e) = GeoPoint::new(
            config.tracking.seed_latitude,
            config.tracking.seed_longitude,
        ) {
            return Err(invalid(
                "tracking",
                "seed_latitude/seed_longitude",
                &format!(
                    "{},{}",
                    config.tracking.seed_latitude, config.tracking.seed_longitude
                ),
                &e.to_string(),
            ));
        }
    }

    // [ble]
    if let Some(section) = ini.section(Some("ble")) {
        if let Some(v) = section.get("scan_window_secs") {
            let secs: u64 = parse_number("ble", "scan_window_secs", v)?;
            if secs == 0 {
                return Err(invalid("ble", "scan_window_secs", v, "must be at least 1"));
            }
            config.ble.scan_window_secs = secs;
        }
        if let Some(v) = section.get("service_uuid") {
            config.ble.service_uuid = parse_uuid("ble", "service_uuid", v)?;
        }
        if let Some(v) = section.get("characteristic_uuid") {
            config.ble.characteristic_uuid = parse_uuid("ble", "characteristic_uuid", v)?;
        }
    }

    // [logging]
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "expected a number"))
}

/// Canonical 8-4-4-4-12 hex UUID, lowercased.
fn parse_uuid(section: &str, key: &str, value: &str) -> Result<String, ConfigFileError> {
    let v = value.trim().to_lowercase();
    let groups: Vec<&str> = v.split('-').collect();
    let lengths_ok = groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len);
    if !lengths_ok || !groups.iter().all(|g| g.chars().all(|c| c.is_ascii_hexdigit())) {
        return Err(invalid(
            section,
            key,
            value,
            "expected a UUID like 6e400001-b5a3-f393-e0a9-e50e24dcca9e",
        ));
    }
    Ok(v)
}

/// Lenient boolean: true/1/yes/on, anything else false.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
