//! In-memory collaborators.
//!
//! Stand-ins for the host map widget, the BLE central and the phone
//! location service. The CLI replays recorded frames through them and the
//! test suites script failures with them.

mod ble;
mod location;
mod map;

pub use ble::{gps_services, ScriptedBleTransport};
pub use location::ScriptedLocationService;
pub use map::{MapCall, RecordingMapHost};
