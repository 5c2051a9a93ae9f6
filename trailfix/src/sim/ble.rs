//! Scripted BLE central.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::ble::transport::{
    BleError, BleTransport, DiscoveredPeripheral, GattCharacteristic, GattService, LinkEvent,
    PeripheralId,
};
use crate::ble::{GPS_NOTIFY_CHARACTERISTIC_UUID, GPS_SERVICE_UUID};
use crate::host::BoxFuture;

/// The GATT table of a well-behaved GPS peripheral.
pub fn gps_services() -> Vec<GattService> {
    vec![GattService {
        uuid: GPS_SERVICE_UUID.to_string(),
        characteristics: vec![
            GattCharacteristic {
                uuid: "6e400002-b5a3-f393-e0a9-e50e24dcca9e".to_string(),
                notify: false,
            },
            GattCharacteristic {
                uuid: GPS_NOTIFY_CHARACTERISTIC_UUID.to_string(),
                notify: true,
            },
        ],
    }]
}

#[derive(Debug, Default)]
struct BleScript {
    peripherals: Vec<DiscoveredPeripheral>,
    scan_error: Option<BleError>,
    connect_error: Option<String>,
    services: Vec<GattService>,
    discovery_error: Option<String>,
    subscribe_error: Option<String>,
    connected: Option<PeripheralId>,
    feed: Option<mpsc::UnboundedSender<LinkEvent>>,
    scans_started: usize,
    scans_stopped: usize,
    connect_attempts: usize,
    disconnects: Vec<PeripheralId>,
}

/// BLE transport double.
///
/// Advertises a fixed list of peripherals (duplicates included), answers
/// connect/discovery/subscribe from the script, and exposes the live
/// notification feed so tests can push frames or drop the link.
#[derive(Debug)]
pub struct ScriptedBleTransport {
    script: Mutex<BleScript>,
}

impl Default for ScriptedBleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBleTransport {
    /// No peripherals in range; a connected peripheral exposes the GPS service.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(BleScript {
                services: gps_services(),
                ..BleScript::default()
            }),
        }
    }

    pub fn with_peripherals(self, peripherals: Vec<DiscoveredPeripheral>) -> Self {
        self.script.lock().peripherals = peripherals;
        self
    }

    pub fn with_scan_error(self, error: BleError) -> Self {
        self.script.lock().scan_error = Some(error);
        self
    }

    pub fn with_connect_error(self, reason: impl Into<String>) -> Self {
        self.script.lock().connect_error = Some(reason.into());
        self
    }

    pub fn with_services(self, services: Vec<GattService>) -> Self {
        self.script.lock().services = services;
        self
    }

    pub fn with_discovery_error(self, reason: impl Into<String>) -> Self {
        self.script.lock().discovery_error = Some(reason.into());
        self
    }

    pub fn with_subscribe_error(self, reason: impl Into<String>) -> Self {
        self.script.lock().subscribe_error = Some(reason.into());
        self
    }

    /// Deliver one notification. Returns false if nothing is subscribed.
    pub fn push_frame(&self, data: impl Into<Vec<u8>>) -> bool {
        match &self.script.lock().feed {
            Some(feed) => feed.send(LinkEvent::Notification(data.into())).is_ok(),
            None => false,
        }
    }

    /// Report a transport-level disconnect and close the feed.
    pub fn drop_link(&self, reason: impl Into<String>) {
        let mut script = self.script.lock();
        if let Some(feed) = script.feed.take() {
            let _ = feed.send(LinkEvent::Disconnected(reason.into()));
        }
        script.connected = None;
    }

    /// Close the feed without a disconnect event.
    pub fn close_feed(&self) {
        let mut script = self.script.lock();
        script.feed = None;
        script.connected = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.script
            .lock()
            .feed
            .as_ref()
            .is_some_and(|feed| !feed.is_closed())
    }

    pub fn scans_started(&self) -> usize {
        self.script.lock().scans_started
    }

    pub fn scans_stopped(&self) -> usize {
        self.script.lock().scans_stopped
    }

    pub fn connect_attempts(&self) -> usize {
        self.script.lock().connect_attempts
    }

    /// Number of `disconnect` calls received.
    pub fn disconnects(&self) -> usize {
        self.script.lock().disconnects.len()
    }

    pub fn disconnected(&self) -> Vec<PeripheralId> {
        self.script.lock().disconnects.clone()
    }

    fn do_start_scan(&self) -> Result<mpsc::UnboundedReceiver<DiscoveredPeripheral>, BleError> {
        let mut script = self.script.lock();
        if let Some(error) = &script.scan_error {
            return Err(error.clone());
        }
        script.scans_started += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        for peripheral in &script.peripherals {
            let _ = tx.send(peripheral.clone());
        }
        Ok(rx)
    }

    fn do_connect(&self, peripheral: PeripheralId) -> Result<(), BleError> {
        let mut script = self.script.lock();
        script.connect_attempts += 1;
        if let Some(reason) = &script.connect_error {
            return Err(BleError::ConnectFailed {
                peripheral,
                reason: reason.clone(),
            });
        }
        script.connected = Some(peripheral);
        Ok(())
    }

    fn do_discover(&self, peripheral: PeripheralId) -> Result<Vec<GattService>, BleError> {
        let script = self.script.lock();
        if script.connected.as_ref() != Some(&peripheral) {
            return Err(BleError::NotConnected(peripheral));
        }
        if let Some(reason) = &script.discovery_error {
            return Err(BleError::DiscoveryFailed {
                peripheral,
                reason: reason.clone(),
            });
        }
        Ok(script.services.clone())
    }

    fn do_subscribe(
        &self,
        peripheral: PeripheralId,
    ) -> Result<mpsc::UnboundedReceiver<LinkEvent>, BleError> {
        let mut script = self.script.lock();
        if script.connected.as_ref() != Some(&peripheral) {
            return Err(BleError::NotConnected(peripheral));
        }
        if let Some(reason) = &script.subscribe_error {
            return Err(BleError::SubscribeFailed {
                peripheral,
                reason: reason.clone(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        script.feed = Some(tx);
        Ok(rx)
    }

    fn do_disconnect(&self, peripheral: PeripheralId) {
        let mut script = self.script.lock();
        if script.connected.as_ref() == Some(&peripheral) {
            script.connected = None;
            script.feed = None;
        }
        script.disconnects.push(peripheral);
    }
}

impl BleTransport for ScriptedBleTransport {
    fn start_scan(
        &self,
    ) -> BoxFuture<'_, Result<mpsc::UnboundedReceiver<DiscoveredPeripheral>, BleError>> {
        let result = self.do_start_scan();
        Box::pin(async move { result })
    }

    fn stop_scan(&self) -> BoxFuture<'_, Result<(), BleError>> {
        self.script.lock().scans_stopped += 1;
        Box::pin(async { Ok(()) })
    }

    fn connect(&self, peripheral: PeripheralId) -> BoxFuture<'_, Result<(), BleError>> {
        let result = self.do_connect(peripheral);
        Box::pin(async move { result })
    }

    fn discover_services(
        &self,
        peripheral: PeripheralId,
    ) -> BoxFuture<'_, Result<Vec<GattService>, BleError>> {
        let result = self.do_discover(peripheral);
        Box::pin(async move { result })
    }

    fn subscribe(
        &self,
        peripheral: PeripheralId,
        _service_uuid: String,
        _characteristic_uuid: String,
    ) -> BoxFuture<'_, Result<mpsc::UnboundedReceiver<LinkEvent>, BleError>> {
        let result = self.do_subscribe(peripheral);
        Box::pin(async move { result })
    }

    fn disconnect(&self, peripheral: PeripheralId) -> BoxFuture<'_, Result<(), BleError>> {
        self.do_disconnect(peripheral);
        Box::pin(async { Ok(()) })
    }
}
