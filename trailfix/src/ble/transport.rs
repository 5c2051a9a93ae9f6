//! BLE transport collaborator.
//!
//! Everything below "deliver bytes from a known characteristic" lives on
//! the platform side of this trait. The session drives it from a single
//! task; the scan window runs it from a helper task.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::host::BoxFuture;

/// Platform identity of a peripheral (MAC address or OS-assigned UUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeripheralId(pub String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Advertisement seen during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPeripheral {
    pub id: PeripheralId,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: i16,
}

impl DiscoveredPeripheral {
    pub fn new(id: impl Into<String>, name: Option<&str>, rssi: i16) -> Self {
        Self {
            id: PeripheralId::new(id),
            name: name.map(str::to_string),
            rssi,
        }
    }

    /// Name for display, falling back to the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// A GATT characteristic as reported by service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: String,
    /// Whether the characteristic supports notifications.
    pub notify: bool,
}

/// A GATT service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: String,
    pub characteristics: Vec<GattCharacteristic>,
}

/// Events on an established notification subscription.
///
/// The receiver closing without a [`LinkEvent::Disconnected`] is also a
/// link loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One notification payload.
    Notification(Vec<u8>),
    /// Transport-level drop (remote disconnect, read failure).
    Disconnected(String),
}

/// Errors reported by the BLE transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BleError {
    /// Bluetooth is off, missing, or permission was refused.
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Connection to {peripheral} failed: {reason}")]
    ConnectFailed {
        peripheral: PeripheralId,
        reason: String,
    },

    #[error("Service discovery on {peripheral} failed: {reason}")]
    DiscoveryFailed {
        peripheral: PeripheralId,
        reason: String,
    },

    #[error("Subscribing on {peripheral} failed: {reason}")]
    SubscribeFailed {
        peripheral: PeripheralId,
        reason: String,
    },

    #[error("Peripheral {0} is not connected")]
    NotConnected(PeripheralId),
}

/// BLE central operations consumed by the tracking engine.
pub trait BleTransport: Send + Sync {
    /// Start discovery. Each advertisement is delivered on the receiver,
    /// possibly more than once per peripheral.
    fn start_scan(
        &self,
    ) -> BoxFuture<'_, Result<mpsc::UnboundedReceiver<DiscoveredPeripheral>, BleError>>;

    /// Stop discovery. Must be safe to call when no scan is running.
    fn stop_scan(&self) -> BoxFuture<'_, Result<(), BleError>>;

    fn connect(&self, peripheral: PeripheralId) -> BoxFuture<'_, Result<(), BleError>>;

    fn discover_services(
        &self,
        peripheral: PeripheralId,
    ) -> BoxFuture<'_, Result<Vec<GattService>, BleError>>;

    /// Enable notifications on a characteristic.
    fn subscribe(
        &self,
        peripheral: PeripheralId,
        service_uuid: String,
        characteristic_uuid: String,
    ) -> BoxFuture<'_, Result<mpsc::UnboundedReceiver<LinkEvent>, BleError>>;

    fn disconnect(&self, peripheral: PeripheralId) -> BoxFuture<'_, Result<(), BleError>>;
}
