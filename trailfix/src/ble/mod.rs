//! BLE GPS peripheral support.
//!
//! The peripheral is an ESP32-class device exposing a Nordic-UART-style
//! service. Each notification on the TX characteristic is one text frame
//! `"<lat>,<lon>"`.
//!
//! # Layout
//!
//! - [`link`] - pure discovery/connection state machine
//! - [`protocol`] - frame parsing
//! - [`scanner`] - the timed scan window
//! - [`transport`] - the platform collaborator trait

pub mod link;
pub mod protocol;
pub mod scanner;
pub mod transport;

pub use link::{BleCommand, BleEvent, BleLink, BlePhase, ConnectionState, PeripheralConnection};
pub use protocol::{parse_frame, FrameError};
pub use scanner::{run_scan, DEFAULT_SCAN_WINDOW};
pub use transport::{
    BleError, BleTransport, DiscoveredPeripheral, GattCharacteristic, GattService, LinkEvent,
    PeripheralId,
};

/// GPS service UUID.
pub const GPS_SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// Notify characteristic carrying position frames.
pub const GPS_NOTIFY_CHARACTERISTIC_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// Compare two UUID strings the way platforms report them (case varies).
pub fn uuid_matches(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_matches_ignores_case() {
        assert!(uuid_matches(
            "6E400001-B5A3-F393-E0A9-E50E24DCCA9E",
            GPS_SERVICE_UUID
        ));
        assert!(!uuid_matches(GPS_SERVICE_UUID, GPS_NOTIFY_CHARACTERISTIC_UUID));
    }
}
