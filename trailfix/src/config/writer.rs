//! Serialization of `ConfigFile` to a commented INI string.

use super::settings::ConfigFile;

pub fn to_config_string(config: &ConfigFile) -> String {
    let access_token = config.map.access_token.as_deref().unwrap_or("");
    let follow_mode = if config.tracking.follow_mode {
        "true"
    } else {
        "false"
    };

    format!(
        r#"[map]
; Map provider access token (required). TRAILFIX_ACCESS_TOKEN overrides it.
access_token = {}
; Offline map style name
style = {}

[tracking]
; Minimum movement in meters before a new point is recorded
distance_threshold_m = {}
; Re-center the map on every accepted position
follow_mode = {}
; Duration of the re-centering animation
camera_animation_ms = {}
; Initial map center, used until the first fix arrives
seed_latitude = {}
seed_longitude = {}

[ble]
; Length of the peripheral scan
scan_window_secs = {}
; GATT service and notify characteristic of the GPS peripheral
service_uuid = {}
characteristic_uuid = {}

[logging]
directory = {}
file = {}
"#,
        access_token,
        config.map.style,
        config.tracking.distance_threshold_m,
        follow_mode,
        config.tracking.camera_animation_ms,
        config.tracking.seed_latitude,
        config.tracking.seed_longitude,
        config.ble.scan_window_secs,
        config.ble.service_uuid,
        config.ble.characteristic_uuid,
        config.logging.directory.to_string_lossy(),
        config.logging.file,
    )
}
