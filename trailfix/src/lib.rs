//! Trailfix - live hiking position tracking
//!
//! This library tracks a hiker's position over an offline map. Fixes come
//! from an external GPS peripheral over Bluetooth Low Energy when one is
//! connected, and from the phone's own location service otherwise. Accepted
//! fixes extend a recorded path that is mirrored onto the host map as a
//! marker plus a polyline, with an optional camera follow mode.
//!
//! The platform surfaces (map widget, location service, BLE central) are
//! traits in [`host`] and [`ble::transport`]; [`sim`] provides in-process
//! implementations used by the CLI replay tool and the tests.

pub mod app;
pub mod ble;
pub mod config;
pub mod geo;
pub mod host;
pub mod logging;
pub mod sim;
pub mod tracking;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
