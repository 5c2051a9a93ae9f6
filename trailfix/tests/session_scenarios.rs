//! End-to-end tracking session scenarios.
//!
//! Each test drives a real `TrackingSession` task against the in-process
//! map, location and BLE doubles:
//! - BLE connect, drop and failure paths with fallback to phone GPS
//! - Frame parsing and jitter filtering on the live notification feed
//! - Teardown releasing the peripheral and the map annotations
//!
//! Run with: `cargo test --test session_scenarios`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use trailfix::ble::{BlePhase, DiscoveredPeripheral, GattCharacteristic, GattService, PeripheralId};
use trailfix::geo::GeoPoint;
use trailfix::host::{PermissionStatus, RawFix};
use trailfix::sim::{RecordingMapHost, ScriptedBleTransport, ScriptedLocationService};
use trailfix::tracking::{
    Collaborators, PositionSource, SessionConfig, SessionEvent, SessionSummary, SourceTransition,
    TrackingError, TrackingHandle, TrackingSession, TrackingSnapshot, TrackingUpdate,
    TransitionReason,
};

// ============================================================================
// Helper Functions
// ============================================================================

const WAIT: Duration = Duration::from_secs(5);

/// Colombo, the default seed.
fn seed() -> GeoPoint {
    GeoPoint::new(6.9271, 79.8612).unwrap()
}

fn point(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).unwrap()
}

fn trail_gps() -> DiscoveredPeripheral {
    DiscoveredPeripheral::new("AA:BB:CC:00:11:22", Some("TrailGPS"), -58)
}

/// A running session plus the doubles behind it.
struct Rig {
    map: Arc<RecordingMapHost>,
    location: Arc<ScriptedLocationService>,
    ble: Arc<ScriptedBleTransport>,
    handle: TrackingHandle,
    updates: broadcast::Receiver<TrackingUpdate>,
    cancel: CancellationToken,
    task: JoinHandle<Result<SessionSummary, TrackingError>>,
}

impl Rig {
    async fn start(location: ScriptedLocationService, ble: ScriptedBleTransport) -> Self {
        let map = Arc::new(RecordingMapHost::new());
        let location = Arc::new(location);
        let ble = Arc::new(ble);
        let collaborators = Collaborators {
            map: map.clone(),
            location: location.clone(),
            ble: ble.clone(),
        };

        let config = SessionConfig::new(seed()).with_scan_window(Duration::from_millis(50));
        let (mut session, handle) = TrackingSession::new(config, collaborators);
        let updates = handle.subscribe();
        session.start().await.unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(session.run(cancel.clone()));

        Self {
            map,
            location,
            ble,
            handle,
            updates,
            cancel,
            task,
        }
    }

    /// Wait for a snapshot matching `predicate`.
    async fn wait_for<F>(&self, predicate: F) -> TrackingSnapshot
    where
        F: FnMut(&TrackingSnapshot) -> bool,
    {
        tokio::time::timeout(WAIT, self.handle.wait_for(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .expect("session ended")
    }

    /// Receive updates until one matches `predicate`, returning the skipped ones too.
    async fn next_update<F>(&mut self, mut predicate: F) -> (TrackingUpdate, Vec<TrackingUpdate>)
    where
        F: FnMut(&TrackingUpdate) -> bool,
    {
        let mut skipped = Vec::new();
        loop {
            let update = tokio::time::timeout(WAIT, self.updates.recv())
                .await
                .expect("timed out waiting for update")
                .expect("update channel closed");
            if predicate(&update) {
                return (update, skipped);
            }
            skipped.push(update);
        }
    }

    /// Scan, pick the first peripheral and wait until BLE is the active source.
    async fn connect(&mut self) -> PeripheralId {
        self.handle.start_scan().unwrap();
        let (found, _) = self
            .next_update(|u| matches!(u, TrackingUpdate::DevicesFound(_)))
            .await;
        let TrackingUpdate::DevicesFound(devices) = found else {
            unreachable!()
        };
        let id = devices[0].id.clone();

        self.handle.choose_peripheral(id.clone()).unwrap();
        self.wait_for(|s| s.active_source == PositionSource::BlePeripheral)
            .await;
        self.drain();
        id
    }

    /// Discard updates already delivered.
    fn drain(&mut self) {
        while self.updates.try_recv().is_ok() {}
    }

    async fn shutdown(self) -> SessionSummary {
        self.cancel.cancel();
        self.task.await.unwrap().unwrap()
    }
}

// ============================================================================
// Source Arbitration
// ============================================================================

/// Phone GPS is used from the start and its fixes land on the map.
#[tokio::test]
async fn test_phone_walk_from_seed() {
    let rig = Rig::start(ScriptedLocationService::available(), ScriptedBleTransport::new()).await;
    assert_eq!(rig.handle.snapshot().active_source, PositionSource::PhoneGps);

    // ~0 m, ~111 m, ~5 m (jitter), ~222 m north of the seed
    rig.location.push_fix(6.9271, 79.8612);
    rig.location.push_fix(6.9281, 79.8612);
    rig.location.push_fix(6.92815, 79.8612);
    rig.location.push_fix(6.9291, 79.8612);

    let snapshot = rig.wait_for(|s| s.path_len == 4).await;
    assert_eq!(snapshot.current, point(6.9291, 79.8612));
    assert_eq!(snapshot.stats.accepted, 3);
    assert_eq!(snapshot.stats.rejected, 1);

    assert_eq!(rig.map.live_markers(), 1);
    assert_eq!(rig.map.live_polylines(), 1);
    assert_eq!(rig.map.marker_position(), Some(point(6.9291, 79.8612)));
    assert_eq!(
        rig.map.polyline_points().unwrap(),
        vec![
            seed(),
            point(6.9271, 79.8612),
            point(6.9281, 79.8612),
            point(6.9291, 79.8612),
        ]
    );

    let summary = rig.shutdown().await;
    assert_eq!(summary.path.len(), 4);
    assert!(summary.stats.distance_m > 200.0);
}

/// A failed BLE connect leaves phone GPS in charge and fixes keep flowing.
#[tokio::test]
async fn test_connect_failure_falls_back_to_phone() {
    let ble = ScriptedBleTransport::new()
        .with_peripherals(vec![trail_gps()])
        .with_connect_error("peripheral out of range");
    let mut rig = Rig::start(ScriptedLocationService::available(), ble).await;

    rig.handle.start_scan().unwrap();
    rig.next_update(|u| matches!(u, TrackingUpdate::DevicesFound(_)))
        .await;
    rig.handle.choose_peripheral(trail_gps().id).unwrap();

    let (failed, _) = rig
        .next_update(|u| matches!(u, TrackingUpdate::BleFailed { .. }))
        .await;
    assert!(matches!(
        failed,
        TrackingUpdate::BleFailed { peripheral: Some(ref id), .. } if *id == trail_gps().id
    ));

    let snapshot = rig.wait_for(|s| s.ble_phase == BlePhase::Failed).await;
    assert_eq!(snapshot.active_source, PositionSource::PhoneGps);
    assert_eq!(rig.ble.connect_attempts(), 1);

    rig.location.push_fix(6.9300, 79.8612);
    let snapshot = rig.wait_for(|s| s.path_len == 2).await;
    assert_eq!(snapshot.current, point(6.9300, 79.8612));

    rig.shutdown().await;
}

/// Phone GPS granted only after a prompt still takes over from `None`, and
/// a failed connect afterwards leaves it in charge.
#[tokio::test]
async fn test_failed_connect_settles_on_phone_after_prompt() {
    let location = ScriptedLocationService::available()
        .with_service(false, true)
        .with_permission(PermissionStatus::Denied, PermissionStatus::GrantedWhileInUse);
    let ble = ScriptedBleTransport::new()
        .with_peripherals(vec![trail_gps()])
        .with_connect_error("peripheral out of range");
    let mut rig = Rig::start(location, ble).await;
    assert_eq!(rig.location.service_requests(), 1);
    assert_eq!(rig.location.permission_requests(), 1);

    rig.handle.start_scan().unwrap();
    rig.next_update(|u| matches!(u, TrackingUpdate::DevicesFound(_)))
        .await;
    rig.handle.choose_peripheral(trail_gps().id).unwrap();
    let (_, before_failure) = rig
        .next_update(|u| matches!(u, TrackingUpdate::BleFailed { .. }))
        .await;

    let transitions: Vec<SourceTransition> = before_failure
        .into_iter()
        .filter_map(|u| match u {
            TrackingUpdate::SourceChanged(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![SourceTransition {
            from: PositionSource::None,
            to: PositionSource::PhoneGps,
            reason: TransitionReason::PhoneAvailable,
        }]
    );

    let snapshot = rig.wait_for(|s| s.ble_phase == BlePhase::Failed).await;
    assert_eq!(snapshot.active_source, PositionSource::PhoneGps);

    rig.location.push_fix(6.9300, 79.8612);
    let (accepted, skipped) = rig
        .next_update(|u| matches!(u, TrackingUpdate::PositionAccepted { .. }))
        .await;
    assert_eq!(
        accepted,
        TrackingUpdate::PositionAccepted {
            point: point(6.9300, 79.8612),
            source: PositionSource::PhoneGps,
            path_len: 2,
        }
    );
    assert!(!skipped
        .iter()
        .any(|u| matches!(u, TrackingUpdate::SourceChanged(_))));

    rig.shutdown().await;
}

/// A peripheral without the GPS characteristic is disconnected and rejected.
#[tokio::test]
async fn test_missing_characteristic_falls_back_to_phone() {
    let services = vec![GattService {
        uuid: trailfix::ble::GPS_SERVICE_UUID.to_string(),
        characteristics: vec![GattCharacteristic {
            uuid: "00002a37-0000-1000-8000-00805f9b34fb".to_string(),
            notify: true,
        }],
    }];
    let ble = ScriptedBleTransport::new()
        .with_peripherals(vec![trail_gps()])
        .with_services(services);
    let mut rig = Rig::start(ScriptedLocationService::available(), ble).await;

    rig.handle.start_scan().unwrap();
    rig.next_update(|u| matches!(u, TrackingUpdate::DevicesFound(_)))
        .await;
    rig.handle.choose_peripheral(trail_gps().id).unwrap();

    let snapshot = rig.wait_for(|s| s.ble_phase == BlePhase::Failed).await;
    assert_eq!(snapshot.active_source, PositionSource::PhoneGps);
    assert_eq!(rig.ble.disconnected(), vec![trail_gps().id]);
    assert!(!rig.ble.is_subscribed());

    rig.shutdown().await;
}

/// Phone fixes are ignored while the peripheral is the active source.
#[tokio::test]
async fn test_phone_fixes_ignored_while_on_ble() {
    let ble = ScriptedBleTransport::new().with_peripherals(vec![trail_gps()]);
    let mut rig = Rig::start(ScriptedLocationService::available(), ble).await;
    rig.connect().await;

    // Enqueued ahead of the frame, so it is handled first.
    rig.handle
        .send(SessionEvent::PhoneLocation(RawFix::new(7.2906, 80.6337)))
        .unwrap();
    assert!(rig.ble.push_frame("6.9350,79.8650\n"));

    let (accepted, _) = rig
        .next_update(|u| matches!(u, TrackingUpdate::PositionAccepted { .. }))
        .await;
    assert_eq!(
        accepted,
        TrackingUpdate::PositionAccepted {
            point: point(6.9350, 79.8650),
            source: PositionSource::BlePeripheral,
            path_len: 2,
        }
    );

    rig.shutdown().await;
}

/// A link drop mid-session hands control back to phone GPS.
#[tokio::test]
async fn test_link_drop_returns_to_phone() {
    let ble = ScriptedBleTransport::new().with_peripherals(vec![trail_gps()]);
    let mut rig = Rig::start(ScriptedLocationService::available(), ble).await;
    rig.connect().await;

    assert!(rig.ble.push_frame("6.9350,79.8650"));
    rig.wait_for(|s| s.path_len == 2).await;

    rig.ble.drop_link("supervision timeout");
    let snapshot = rig
        .wait_for(|s| s.active_source == PositionSource::PhoneGps)
        .await;
    assert_eq!(snapshot.ble_phase, BlePhase::Disconnected);

    rig.location.push_fix(6.9400, 79.8650);
    let snapshot = rig.wait_for(|s| s.path_len == 3).await;
    assert_eq!(snapshot.current, point(6.9400, 79.8650));

    // Reconnect goes back to the same peripheral.
    rig.handle.reconnect().unwrap();
    rig.wait_for(|s| s.active_source == PositionSource::BlePeripheral)
        .await;
    assert_eq!(rig.ble.connect_attempts(), 2);

    // The dropped link needs no disconnect; teardown releases the new one.
    let summary = rig.shutdown().await;
    assert_eq!(summary.final_source, PositionSource::BlePeripheral);
    assert_eq!(summary.disconnects, 1);
}

// ============================================================================
// Notification Feed
// ============================================================================

/// A frame with one field is dropped without touching state or source.
#[tokio::test]
async fn test_malformed_frame_dropped() {
    let ble = ScriptedBleTransport::new().with_peripherals(vec![trail_gps()]);
    let mut rig = Rig::start(ScriptedLocationService::available(), ble).await;
    rig.connect().await;

    assert!(rig.ble.push_frame("12.3"));
    assert!(rig.ble.push_frame(vec![0xff, 0xfe]));
    assert!(rig.ble.push_frame("6.9350,79.8650"));

    let (accepted, skipped) = rig
        .next_update(|u| matches!(u, TrackingUpdate::PositionAccepted { .. }))
        .await;
    assert!(matches!(
        accepted,
        TrackingUpdate::PositionAccepted { path_len: 2, .. }
    ));
    assert!(!skipped
        .iter()
        .any(|u| matches!(u, TrackingUpdate::SourceChanged(_) | TrackingUpdate::BleFailed { .. })));

    let snapshot = rig.handle.snapshot();
    assert_eq!(snapshot.active_source, PositionSource::BlePeripheral);
    assert_eq!(snapshot.ble_phase, BlePhase::Connected);

    rig.shutdown().await;
}

// ============================================================================
// Scanning
// ============================================================================

/// An empty scan window reports no devices and keeps the current source.
#[tokio::test]
async fn test_empty_scan_reports_no_devices() {
    let mut rig = Rig::start(ScriptedLocationService::available(), ScriptedBleTransport::new()).await;

    rig.handle.start_scan().unwrap();
    rig.next_update(|u| *u == TrackingUpdate::NoDevicesFound).await;

    assert_eq!(rig.ble.scans_started(), 1);
    assert_eq!(rig.ble.scans_stopped(), 1);
    assert_eq!(rig.handle.snapshot().active_source, PositionSource::PhoneGps);

    rig.shutdown().await;
}

/// Repeated advertisements of one peripheral are presented once.
#[tokio::test]
async fn test_scan_deduplicates_peripherals() {
    let ble = ScriptedBleTransport::new().with_peripherals(vec![
        trail_gps(),
        DiscoveredPeripheral::new("AA:BB:CC:00:11:22", Some("TrailGPS"), -61),
        DiscoveredPeripheral::new("11:22:33:44:55:66", None, -80),
    ]);
    let mut rig = Rig::start(ScriptedLocationService::available(), ble).await;

    rig.handle.start_scan().unwrap();
    let (found, _) = rig
        .next_update(|u| matches!(u, TrackingUpdate::DevicesFound(_)))
        .await;
    let TrackingUpdate::DevicesFound(devices) = found else {
        unreachable!()
    };
    assert_eq!(devices.len(), 2);

    rig.shutdown().await;
}

// ============================================================================
// Teardown
// ============================================================================

/// Disposing a connected session disconnects exactly once and stops the feed.
#[tokio::test]
async fn test_dispose_while_connected() {
    let ble = ScriptedBleTransport::new().with_peripherals(vec![trail_gps()]);
    let mut rig = Rig::start(ScriptedLocationService::available(), ble).await;
    let id = rig.connect().await;

    assert!(rig.ble.push_frame("6.9350,79.8650"));
    rig.wait_for(|s| s.path_len == 2).await;

    let map = rig.map.clone();
    let ble = rig.ble.clone();
    let handle = rig.handle.clone();
    let summary = rig.shutdown().await;

    assert_eq!(summary.disconnects, 1);
    assert_eq!(ble.disconnected(), vec![id]);
    assert_eq!(summary.path.len(), 2);
    assert_eq!(summary.final_source, PositionSource::BlePeripheral);

    // Feed released: later frames go nowhere.
    assert!(!ble.push_frame("7.0000,80.0000"));
    assert_eq!(handle.snapshot().path_len, 2);
    assert_eq!(handle.snapshot().active_source, PositionSource::None);
    assert!(handle.start_scan().is_err());

    assert_eq!(map.live_markers(), 0);
    assert_eq!(map.live_polylines(), 0);
}

/// Dropping every handle ends the session on its own.
#[tokio::test]
async fn test_session_ends_when_handles_dropped() {
    let rig = Rig::start(ScriptedLocationService::unsupported(), ScriptedBleTransport::new()).await;
    let Rig { handle, task, .. } = rig;
    drop(handle);

    let summary = tokio::time::timeout(WAIT, task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.path.points(), &[seed()]);
    assert_eq!(summary.final_source, PositionSource::None);
}
