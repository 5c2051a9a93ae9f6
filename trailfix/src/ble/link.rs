//! BLE discovery and connection state machine.
//!
//! [`BleLink`] is a pure state machine: it consumes [`BleEvent`]s and returns
//! the [`BleCommand`]s the session must carry out. It never touches the
//! transport itself, so every transition is testable without a runtime.
//!
//! # State Machine
//!
//! ```text
//! Idle --StartScan--> Scanning
//! Scanning --window elapsed, devices--> AwaitingSelection
//! Scanning --window elapsed, none-----> Idle
//! AwaitingSelection --PeripheralChosen--> Connecting
//! Connecting --ConnectSucceeded--> ServiceDiscovery
//! ServiceDiscovery --UUIDs resolved--> Subscribed
//! Subscribed --SubscribeSucceeded--> Connected
//!
//! Connecting | ServiceDiscovery | Subscribed --any failure or drop--> Failed
//! Connected --drop--> Disconnected
//! Disconnected | Failed --PeripheralChosen--> Connecting   (explicit reconnect)
//! any --Teardown--> Idle
//! ```
//!
//! Events carrying a peripheral id that is not the current connection, or
//! arriving in a phase that does not expect them, are stale and ignored.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::protocol::parse_frame;
use super::transport::{BleError, DiscoveredPeripheral, GattService, PeripheralId};
use super::{uuid_matches, GPS_NOTIFY_CHARACTERISTIC_UUID, GPS_SERVICE_UUID};
use crate::geo::GeoPoint;

/// Malformed frames per connection logged at WARN before dropping to DEBUG.
pub const MAX_FRAME_WARNINGS: u64 = 3;

/// Phase of the BLE link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlePhase {
    Idle,
    Scanning,
    AwaitingSelection,
    Connecting,
    ServiceDiscovery,
    Subscribed,
    Connected,
    Disconnected,
    Failed,
}

impl BlePhase {
    /// Whether a scan may start from this phase.
    fn can_scan(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::AwaitingSelection | Self::Disconnected | Self::Failed
        )
    }

    /// Whether a peripheral may be chosen from this phase.
    fn can_choose(&self) -> bool {
        matches!(
            self,
            Self::AwaitingSelection | Self::Disconnected | Self::Failed
        )
    }

    /// Phases between "connect requested" and "streaming".
    fn is_establishing(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::ServiceDiscovery | Self::Subscribed
        )
    }
}

impl std::fmt::Display for BlePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::AwaitingSelection => "awaiting selection",
            Self::Connecting => "connecting",
            Self::ServiceDiscovery => "service discovery",
            Self::Subscribed => "subscribing",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Transport-level state of the chosen peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

/// The peripheral the user chose and what is known about it.
#[derive(Debug, Clone)]
pub struct PeripheralConnection {
    pub id: PeripheralId,
    pub discovered_at: Instant,
    pub service_found: bool,
    pub notify_characteristic_found: bool,
    pub connection_state: ConnectionState,
    pub frames_received: u64,
    pub malformed_frames: u64,
}

impl PeripheralConnection {
    fn new(id: PeripheralId, discovered_at: Instant) -> Self {
        Self {
            id,
            discovered_at,
            service_found: false,
            notify_characteristic_found: false,
            connection_state: ConnectionState::Connecting,
            frames_received: 0,
            malformed_frames: 0,
        }
    }

    /// Connected with both UUIDs resolved.
    pub fn is_ready(&self) -> bool {
        self.connection_state == ConnectionState::Connected
            && self.service_found
            && self.notify_characteristic_found
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum BleEvent {
    /// User asked for a scan.
    StartScan,
    PeripheralDiscovered(DiscoveredPeripheral),
    /// The scan window ran out; discovery has been stopped.
    ScanWindowElapsed,
    ScanFailed(BleError),
    /// User picked a peripheral (initial choice or reconnect).
    PeripheralChosen(PeripheralId),
    ConnectSucceeded(PeripheralId),
    ConnectFailed(PeripheralId, BleError),
    ServicesDiscovered(PeripheralId, Vec<GattService>),
    DiscoveryFailed(PeripheralId, BleError),
    SubscribeSucceeded(PeripheralId),
    SubscribeFailed(PeripheralId, BleError),
    Notification(PeripheralId, Vec<u8>),
    /// Transport-level drop of the peripheral.
    LinkLost(PeripheralId, String),
    Teardown,
}

/// Work the session must carry out after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum BleCommand {
    /// Open the scan window.
    StartScan,
    /// Show the de-duplicated scan results for selection.
    PresentDevices(Vec<DiscoveredPeripheral>),
    ReportNoDevices,
    Connect(PeripheralId),
    DiscoverServices(PeripheralId),
    Subscribe {
        peripheral: PeripheralId,
        service_uuid: String,
        characteristic_uuid: String,
    },
    /// Link fully established; BLE may become the active source.
    Ready(PeripheralId),
    /// Valid position frame.
    Position(GeoPoint),
    /// Scan, connect, discovery or subscribe failed.
    Failed {
        peripheral: Option<PeripheralId>,
        reason: String,
    },
    /// An established link dropped.
    Dropped {
        peripheral: PeripheralId,
        reason: String,
    },
    /// Release the platform connection.
    Disconnect(PeripheralId),
}

/// BLE discovery/connection state machine.
#[derive(Debug)]
pub struct BleLink {
    phase: BlePhase,
    service_uuid: String,
    characteristic_uuid: String,
    discovered: Vec<(DiscoveredPeripheral, Instant)>,
    connection: Option<PeripheralConnection>,
}

impl Default for BleLink {
    fn default() -> Self {
        Self::new(GPS_SERVICE_UUID, GPS_NOTIFY_CHARACTERISTIC_UUID)
    }
}

impl BleLink {
    pub fn new(service_uuid: impl Into<String>, characteristic_uuid: impl Into<String>) -> Self {
        Self {
            phase: BlePhase::Idle,
            service_uuid: service_uuid.into(),
            characteristic_uuid: characteristic_uuid.into(),
            discovered: Vec::new(),
            connection: None,
        }
    }

    pub fn phase(&self) -> BlePhase {
        self.phase
    }

    pub fn connection(&self) -> Option<&PeripheralConnection> {
        self.connection.as_ref()
    }

    /// De-duplicated results of the last scan, in discovery order.
    pub fn discovered(&self) -> Vec<DiscoveredPeripheral> {
        self.discovered.iter().map(|(p, _)| p.clone()).collect()
    }

    /// Advance the state machine.
    pub fn handle(&mut self, event: BleEvent) -> Vec<BleCommand> {
        match event {
            BleEvent::StartScan => self.on_start_scan(),
            BleEvent::PeripheralDiscovered(peripheral) => {
                self.on_discovered(peripheral);
                Vec::new()
            }
            BleEvent::ScanWindowElapsed => self.on_scan_elapsed(),
            BleEvent::ScanFailed(error) => self.on_scan_failed(error),
            BleEvent::PeripheralChosen(id) => self.on_chosen(id),
            BleEvent::ConnectSucceeded(id) => self.on_connected(id),
            BleEvent::ConnectFailed(id, error) => self.on_establish_failed(id, error.to_string()),
            BleEvent::ServicesDiscovered(id, services) => self.on_services(id, services),
            BleEvent::DiscoveryFailed(id, error) => self.on_establish_failed(id, error.to_string()),
            BleEvent::SubscribeSucceeded(id) => self.on_subscribed(id),
            BleEvent::SubscribeFailed(id, error) => self.on_establish_failed(id, error.to_string()),
            BleEvent::Notification(id, data) => self.on_notification(id, &data),
            BleEvent::LinkLost(id, reason) => self.on_link_lost(id, reason),
            BleEvent::Teardown => self.on_teardown(),
        }
    }

    fn on_start_scan(&mut self) -> Vec<BleCommand> {
        if !self.phase.can_scan() {
            debug!(phase = %self.phase, "Scan request ignored");
            return Vec::new();
        }
        self.discovered.clear();
        self.phase = BlePhase::Scanning;
        vec![BleCommand::StartScan]
    }

    fn on_discovered(&mut self, peripheral: DiscoveredPeripheral) {
        if self.phase != BlePhase::Scanning {
            return;
        }
        if self.discovered.iter().any(|(p, _)| p.id == peripheral.id) {
            return;
        }
        debug!(
            peripheral = %peripheral.id,
            name = peripheral.label(),
            rssi = peripheral.rssi,
            "Peripheral discovered"
        );
        self.discovered.push((peripheral, Instant::now()));
    }

    fn on_scan_elapsed(&mut self) -> Vec<BleCommand> {
        if self.phase != BlePhase::Scanning {
            return Vec::new();
        }
        if self.discovered.is_empty() {
            info!("Scan finished, no devices found");
            self.phase = BlePhase::Idle;
            vec![BleCommand::ReportNoDevices]
        } else {
            info!(count = self.discovered.len(), "Scan finished");
            self.phase = BlePhase::AwaitingSelection;
            vec![BleCommand::PresentDevices(self.discovered())]
        }
    }

    fn on_scan_failed(&mut self, error: BleError) -> Vec<BleCommand> {
        if self.phase != BlePhase::Scanning {
            return Vec::new();
        }
        warn!(error = %error, "BLE scan failed");
        self.phase = BlePhase::Idle;
        vec![BleCommand::Failed {
            peripheral: None,
            reason: error.to_string(),
        }]
    }

    fn on_chosen(&mut self, id: PeripheralId) -> Vec<BleCommand> {
        if !self.phase.can_choose() {
            debug!(phase = %self.phase, peripheral = %id, "Selection ignored");
            return Vec::new();
        }
        let Some(discovered_at) = self
            .discovered
            .iter()
            .find(|(p, _)| p.id == id)
            .map(|(_, at)| *at)
        else {
            warn!(peripheral = %id, "Selected peripheral was not discovered");
            return Vec::new();
        };

        info!(peripheral = %id, "Connecting to peripheral");
        self.connection = Some(PeripheralConnection::new(id.clone(), discovered_at));
        self.phase = BlePhase::Connecting;
        vec![BleCommand::Connect(id)]
    }

    fn on_connected(&mut self, id: PeripheralId) -> Vec<BleCommand> {
        if self.phase != BlePhase::Connecting {
            return Vec::new();
        }
        let Some(connection) = self.current_connection_mut(&id) else {
            return Vec::new();
        };
        connection.connection_state = ConnectionState::Connected;
        self.phase = BlePhase::ServiceDiscovery;
        debug!(peripheral = %id, "Connected, discovering services");
        vec![BleCommand::DiscoverServices(id)]
    }

    fn on_services(&mut self, id: PeripheralId, services: Vec<GattService>) -> Vec<BleCommand> {
        if self.phase != BlePhase::ServiceDiscovery {
            return Vec::new();
        }
        let service_uuid = self.service_uuid.clone();
        let characteristic_uuid = self.characteristic_uuid.clone();
        let Some(connection) = self.current_connection_mut(&id) else {
            return Vec::new();
        };

        let service = services.iter().find(|s| uuid_matches(&s.uuid, &service_uuid));
        connection.service_found = service.is_some();
        connection.notify_characteristic_found = service
            .map(|s| {
                s.characteristics
                    .iter()
                    .any(|c| c.notify && uuid_matches(&c.uuid, &characteristic_uuid))
            })
            .unwrap_or(false);

        if !connection.service_found {
            return self.fail_connected(id, format!("service {} not found", service_uuid));
        }
        if !connection.notify_characteristic_found {
            return self.fail_connected(
                id,
                format!("notify characteristic {} not found", characteristic_uuid),
            );
        }

        self.phase = BlePhase::Subscribed;
        vec![BleCommand::Subscribe {
            peripheral: id,
            service_uuid,
            characteristic_uuid,
        }]
    }

    fn on_subscribed(&mut self, id: PeripheralId) -> Vec<BleCommand> {
        if self.phase != BlePhase::Subscribed || self.current_connection_mut(&id).is_none() {
            return Vec::new();
        }
        self.phase = BlePhase::Connected;
        info!(peripheral = %id, "BLE GPS streaming");
        vec![BleCommand::Ready(id)]
    }

    fn on_notification(&mut self, id: PeripheralId, data: &[u8]) -> Vec<BleCommand> {
        if self.phase != BlePhase::Connected {
            return Vec::new();
        }
        let Some(connection) = self.current_connection_mut(&id) else {
            return Vec::new();
        };
        connection.frames_received += 1;

        match parse_frame(data) {
            Ok(point) => vec![BleCommand::Position(point)],
            Err(e) => {
                connection.malformed_frames += 1;
                let raw = String::from_utf8_lossy(data);
                let frame = raw.trim();
                if connection.malformed_frames <= MAX_FRAME_WARNINGS {
                    warn!(peripheral = %id, frame = %frame, error = %e, "Dropping malformed frame");
                } else {
                    debug!(peripheral = %id, frame = %frame, error = %e, "Dropping malformed frame");
                }
                Vec::new()
            }
        }
    }

    fn on_link_lost(&mut self, id: PeripheralId, reason: String) -> Vec<BleCommand> {
        let phase = self.phase;
        let Some(connection) = self.current_connection_mut(&id) else {
            return Vec::new();
        };

        if phase == BlePhase::Connected {
            connection.connection_state = ConnectionState::Disconnected;
            self.phase = BlePhase::Disconnected;
            warn!(peripheral = %id, reason = %reason, "BLE link lost");
            vec![BleCommand::Dropped {
                peripheral: id,
                reason,
            }]
        } else if phase.is_establishing() {
            connection.connection_state = ConnectionState::Failed;
            self.phase = BlePhase::Failed;
            warn!(peripheral = %id, phase = %phase, reason = %reason, "BLE link lost while connecting");
            vec![BleCommand::Failed {
                peripheral: Some(id),
                reason: format!("disconnected during {}: {}", phase, reason),
            }]
        } else {
            Vec::new()
        }
    }

    fn on_establish_failed(&mut self, id: PeripheralId, reason: String) -> Vec<BleCommand> {
        if !self.phase.is_establishing() {
            return Vec::new();
        }
        let Some(connection) = self.current_connection_mut(&id) else {
            return Vec::new();
        };
        if connection.connection_state == ConnectionState::Connected {
            return self.fail_connected(id, reason);
        }

        connection.connection_state = ConnectionState::Failed;
        self.phase = BlePhase::Failed;
        warn!(peripheral = %id, reason = %reason, "BLE connect failed");
        vec![BleCommand::Failed {
            peripheral: Some(id),
            reason,
        }]
    }

    /// Fail a peripheral that is connected at the transport level, releasing
    /// the connection first.
    fn fail_connected(&mut self, id: PeripheralId, reason: String) -> Vec<BleCommand> {
        if let Some(connection) = self.connection.as_mut() {
            connection.connection_state = ConnectionState::Failed;
        }
        self.phase = BlePhase::Failed;
        warn!(peripheral = %id, reason = %reason, "BLE setup failed");
        vec![
            BleCommand::Disconnect(id.clone()),
            BleCommand::Failed {
                peripheral: Some(id),
                reason,
            },
        ]
    }

    fn on_teardown(&mut self) -> Vec<BleCommand> {
        let mut commands = Vec::new();
        if let Some(connection) = self.connection.as_mut() {
            if connection.connection_state == ConnectionState::Connected {
                connection.connection_state = ConnectionState::Disconnected;
                commands.push(BleCommand::Disconnect(connection.id.clone()));
            }
        }
        if self.phase != BlePhase::Idle {
            debug!(phase = %self.phase, "BLE link torn down");
        }
        self.phase = BlePhase::Idle;
        commands
    }

    fn current_connection_mut(&mut self, id: &PeripheralId) -> Option<&mut PeripheralConnection> {
        match self.connection.as_mut() {
            Some(connection) if &connection.id == id => Some(connection),
            _ => {
                debug!(peripheral = %id, "Event for stale peripheral ignored");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::GattCharacteristic;

    fn gps_services() -> Vec<GattService> {
        vec![GattService {
            uuid: GPS_SERVICE_UUID.to_uppercase(),
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

    fn esp32() -> PeripheralId {
        PeripheralId::new("AA:BB:CC:DD:EE:01")
    }

    fn scanned_link() -> BleLink {
        let mut link = BleLink::default();
        link.handle(BleEvent::StartScan);
        link.handle(BleEvent::PeripheralDiscovered(DiscoveredPeripheral::new(
            "AA:BB:CC:DD:EE:01",
            Some("ESP32-GPS"),
            -55,
        )));
        link.handle(BleEvent::ScanWindowElapsed);
        link
    }

    fn connected_link() -> BleLink {
        let mut link = scanned_link();
        link.handle(BleEvent::PeripheralChosen(esp32()));
        link.handle(BleEvent::ConnectSucceeded(esp32()));
        link.handle(BleEvent::ServicesDiscovered(esp32(), gps_services()));
        link.handle(BleEvent::SubscribeSucceeded(esp32()));
        link
    }

    #[test]
    fn test_scan_deduplicates() {
        let mut link = BleLink::default();
        assert_eq!(link.handle(BleEvent::StartScan), vec![BleCommand::StartScan]);

        for (id, rssi) in [("A", -50), ("B", -70), ("A", -48)] {
            link.handle(BleEvent::PeripheralDiscovered(DiscoveredPeripheral::new(
                id, None, rssi,
            )));
        }

        let commands = link.handle(BleEvent::ScanWindowElapsed);
        match &commands[..] {
            [BleCommand::PresentDevices(devices)] => {
                let ids: Vec<_> = devices.iter().map(|d| d.id.as_str()).collect();
                assert_eq!(ids, vec!["A", "B"]);
            }
            other => panic!("unexpected commands: {:?}", other),
        }
        assert_eq!(link.phase(), BlePhase::AwaitingSelection);
    }

    #[test]
    fn test_empty_scan_returns_to_idle() {
        let mut link = BleLink::default();
        link.handle(BleEvent::StartScan);
        assert_eq!(
            link.handle(BleEvent::ScanWindowElapsed),
            vec![BleCommand::ReportNoDevices]
        );
        assert_eq!(link.phase(), BlePhase::Idle);
    }

    #[test]
    fn test_discovery_outside_scan_ignored() {
        let mut link = BleLink::default();
        link.handle(BleEvent::PeripheralDiscovered(DiscoveredPeripheral::new(
            "A", None, -50,
        )));
        assert!(link.discovered().is_empty());
    }

    #[test]
    fn test_happy_path() {
        let mut link = scanned_link();

        assert_eq!(
            link.handle(BleEvent::PeripheralChosen(esp32())),
            vec![BleCommand::Connect(esp32())]
        );
        assert_eq!(link.phase(), BlePhase::Connecting);

        assert_eq!(
            link.handle(BleEvent::ConnectSucceeded(esp32())),
            vec![BleCommand::DiscoverServices(esp32())]
        );
        assert_eq!(link.phase(), BlePhase::ServiceDiscovery);

        let commands = link.handle(BleEvent::ServicesDiscovered(esp32(), gps_services()));
        assert!(matches!(&commands[..], [BleCommand::Subscribe { .. }]));
        assert_eq!(link.phase(), BlePhase::Subscribed);

        assert_eq!(
            link.handle(BleEvent::SubscribeSucceeded(esp32())),
            vec![BleCommand::Ready(esp32())]
        );
        assert_eq!(link.phase(), BlePhase::Connected);
        assert!(link.connection().unwrap().is_ready());
    }

    #[test]
    fn test_unknown_selection_ignored() {
        let mut link = scanned_link();
        assert!(link
            .handle(BleEvent::PeripheralChosen(PeripheralId::new("nope")))
            .is_empty());
        assert_eq!(link.phase(), BlePhase::AwaitingSelection);
    }

    #[test]
    fn test_connect_failure() {
        let mut link = scanned_link();
        link.handle(BleEvent::PeripheralChosen(esp32()));

        let error = BleError::ConnectFailed {
            peripheral: esp32(),
            reason: "timeout".to_string(),
        };
        let commands = link.handle(BleEvent::ConnectFailed(esp32(), error));
        assert!(matches!(
            &commands[..],
            [BleCommand::Failed { peripheral: Some(_), .. }]
        ));
        assert_eq!(link.phase(), BlePhase::Failed);
        assert_eq!(
            link.connection().unwrap().connection_state,
            ConnectionState::Failed
        );
    }

    #[test]
    fn test_missing_service_disconnects_and_fails() {
        let mut link = scanned_link();
        link.handle(BleEvent::PeripheralChosen(esp32()));
        link.handle(BleEvent::ConnectSucceeded(esp32()));

        let commands = link.handle(BleEvent::ServicesDiscovered(esp32(), Vec::new()));
        assert_eq!(commands[0], BleCommand::Disconnect(esp32()));
        assert!(matches!(&commands[1], BleCommand::Failed { reason, .. } if reason.contains("service")));
        assert!(!link.connection().unwrap().service_found);
    }

    #[test]
    fn test_missing_notify_characteristic() {
        let mut link = scanned_link();
        link.handle(BleEvent::PeripheralChosen(esp32()));
        link.handle(BleEvent::ConnectSucceeded(esp32()));

        let mut services = gps_services();
        services[0].characteristics.retain(|c| !c.notify);
        let commands = link.handle(BleEvent::ServicesDiscovered(esp32(), services));

        assert!(matches!(&commands[1], BleCommand::Failed { reason, .. } if reason.contains("characteristic")));
        let connection = link.connection().unwrap();
        assert!(connection.service_found);
        assert!(!connection.notify_characteristic_found);
    }

    #[test]
    fn test_drop_during_service_discovery_is_failure() {
        let mut link = scanned_link();
        link.handle(BleEvent::PeripheralChosen(esp32()));
        link.handle(BleEvent::ConnectSucceeded(esp32()));

        let commands = link.handle(BleEvent::LinkLost(esp32(), "remote closed".to_string()));
        assert!(matches!(&commands[..], [BleCommand::Failed { .. }]));
        assert_eq!(link.phase(), BlePhase::Failed);

        // Late discovery result is stale
        assert!(link
            .handle(BleEvent::ServicesDiscovered(esp32(), gps_services()))
            .is_empty());
        assert_eq!(link.phase(), BlePhase::Failed);
    }

    #[test]
    fn test_notification_parsing() {
        let mut link = connected_link();

        let commands = link.handle(BleEvent::Notification(esp32(), b"6.95,79.90\n".to_vec()));
        assert_eq!(
            commands,
            vec![BleCommand::Position(GeoPoint::new(6.95, 79.90).unwrap())]
        );

        assert!(link
            .handle(BleEvent::Notification(esp32(), b"12.3".to_vec()))
            .is_empty());
        assert_eq!(link.phase(), BlePhase::Connected);

        let connection = link.connection().unwrap();
        assert_eq!(connection.frames_received, 2);
        assert_eq!(connection.malformed_frames, 1);
    }

    #[test]
    fn test_notification_from_other_peripheral_ignored() {
        let mut link = connected_link();
        assert!(link
            .handle(BleEvent::Notification(
                PeripheralId::new("other"),
                b"1.0,1.0".to_vec()
            ))
            .is_empty());
    }

    #[test]
    fn test_link_drop_then_reconnect() {
        let mut link = connected_link();

        let commands = link.handle(BleEvent::LinkLost(esp32(), "out of range".to_string()));
        assert_eq!(
            commands,
            vec![BleCommand::Dropped {
                peripheral: esp32(),
                reason: "out of range".to_string()
            }]
        );
        assert_eq!(link.phase(), BlePhase::Disconnected);

        // Frames after the drop are not processed
        assert!(link
            .handle(BleEvent::Notification(esp32(), b"1.0,1.0".to_vec()))
            .is_empty());

        assert_eq!(
            link.handle(BleEvent::PeripheralChosen(esp32())),
            vec![BleCommand::Connect(esp32())]
        );
    }

    #[test]
    fn test_teardown_disconnects_once() {
        let mut link = connected_link();

        assert_eq!(
            link.handle(BleEvent::Teardown),
            vec![BleCommand::Disconnect(esp32())]
        );
        assert!(link.handle(BleEvent::Teardown).is_empty());
        assert_eq!(link.phase(), BlePhase::Idle);
    }

    #[test]
    fn test_teardown_after_drop_does_not_disconnect() {
        let mut link = connected_link();
        link.handle(BleEvent::LinkLost(esp32(), "gone".to_string()));
        assert!(link.handle(BleEvent::Teardown).is_empty());
    }

    #[test]
    fn test_scan_failure() {
        let mut link = BleLink::default();
        link.handle(BleEvent::StartScan);
        let commands = link.handle(BleEvent::ScanFailed(BleError::AdapterUnavailable(
            "powered off".to_string(),
        )));
        assert!(matches!(
            &commands[..],
            [BleCommand::Failed { peripheral: None, .. }]
        ));
        assert_eq!(link.phase(), BlePhase::Idle);
    }

    #[test]
    fn test_scan_ignored_while_connected() {
        let mut link = connected_link();
        assert!(link.handle(BleEvent::StartScan).is_empty());
        assert_eq!(link.phase(), BlePhase::Connected);
    }
}
