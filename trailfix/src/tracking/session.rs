//! Tracking session.
//!
//! A [`TrackingSession`] owns one [`TrackingState`](super::TrackingState),
//! one pair of map annotations and one BLE link. It is driven by a single
//! task consuming a single event queue, so every handler that touches the
//! path, the annotations or the link runs to completion before the next
//! event is looked at.
//!
//! # Event Flow
//!
//! ```text
//!   TrackingHandle ──┐
//!   scan window ─────┼──► SessionEvent queue ──► TrackingSession::handle
//!   BLE notifications┤                               │
//!   phone fixes ─────┘                               ├─► BleLink ─► BleCommand ─► transport
//!                                                    ├─► SourceArbiter
//!                                                    ├─► PathRecorder
//!                                                    └─► annotations / camera
//! ```
//!
//! Transport calls (connect, discover, subscribe, disconnect) are awaited
//! inside the handler. Their results are fed back to the link as follow-up
//! events within the same cycle, so a BLE failure moves the active source
//! before any other event is processed.
//!
//! Helper tasks hold only weak senders: dropping every [`TrackingHandle`]
//! closes the queue and ends the session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::annotations::AnnotationSynchronizer;
use super::arbiter::{SourceArbiter, SourceTransition};
use super::camera::{CameraFollowController, DEFAULT_ANIMATION_DURATION};
use super::recorder::{PathRecorder, RecorderStats, SampleOutcome, DEFAULT_DISTANCE_THRESHOLD_M};
use super::state::{PositionSource, SampleOrigin, TrackPath, TrackingState};
use crate::ble::link::{BleCommand, BleEvent, BleLink, BlePhase};
use crate::ble::scanner::{run_scan, DEFAULT_SCAN_WINDOW};
use crate::ble::transport::{BleTransport, DiscoveredPeripheral, LinkEvent, PeripheralId};
use crate::ble::{GPS_NOTIFY_CHARACTERISTIC_UUID, GPS_SERVICE_UUID};
use crate::geo::GeoPoint;
use crate::host::location::{ensure_location_access, LocationService, RawFix};
use crate::host::{HostError, MapHost, MarkerStyle, PolylineStyle};

/// Capacity of the update broadcast channel.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Errors that end a tracking session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    /// The host map failed in a way tracking cannot recover from.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The session task is gone; the request was not delivered.
    #[error("Tracking session has shut down")]
    SessionClosed,
}

/// Settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Initial map center; the path is seeded with it.
    pub seed: GeoPoint,
    pub distance_threshold_m: f64,
    pub follow_mode: bool,
    pub camera_animation: Duration,
    pub scan_window: Duration,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    pub marker_style: MarkerStyle,
    pub polyline_style: PolylineStyle,
}

impl SessionConfig {
    pub fn new(seed: GeoPoint) -> Self {
        Self {
            seed,
            distance_threshold_m: DEFAULT_DISTANCE_THRESHOLD_M,
            follow_mode: false,
            camera_animation: DEFAULT_ANIMATION_DURATION,
            scan_window: DEFAULT_SCAN_WINDOW,
            service_uuid: GPS_SERVICE_UUID.to_string(),
            characteristic_uuid: GPS_NOTIFY_CHARACTERISTIC_UUID.to_string(),
            marker_style: MarkerStyle::default(),
            polyline_style: PolylineStyle::default(),
        }
    }

    pub fn with_follow_mode(mut self, enabled: bool) -> Self {
        self.follow_mode = enabled;
        self
    }

    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }
}

/// Platform collaborators a session drives.
#[derive(Clone)]
pub struct Collaborators {
    pub map: Arc<dyn MapHost>,
    pub location: Arc<dyn LocationService>,
    pub ble: Arc<dyn BleTransport>,
}

/// Everything the session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Output of the BLE helpers (scan window, notification feed).
    Ble(BleEvent),
    PhoneLocation(RawFix),
    /// The phone location stream closed.
    PhoneStreamEnded,
    StartScan,
    ChoosePeripheral(PeripheralId),
    /// Connect again to the last chosen peripheral.
    Reconnect,
    SetFollowMode(bool),
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingUpdate {
    PositionAccepted {
        point: GeoPoint,
        source: PositionSource,
        path_len: usize,
    },
    SourceChanged(SourceTransition),
    DevicesFound(Vec<DiscoveredPeripheral>),
    NoDevicesFound,
    /// BLE scan/connect failed or an established link dropped.
    BleFailed {
        peripheral: Option<PeripheralId>,
        reason: String,
    },
    FollowModeChanged(bool),
}

/// Latest view of the session, published after every event.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSnapshot {
    pub current: GeoPoint,
    pub path_len: usize,
    pub active_source: PositionSource,
    pub follow_mode: bool,
    pub ble_phase: BlePhase,
    pub stats: RecorderStats,
}

/// Result of a finished session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub final_position: GeoPoint,
    pub path: TrackPath,
    pub stats: RecorderStats,
    /// Active source just before teardown.
    pub final_source: PositionSource,
    pub source_changes: usize,
    /// `disconnect` calls issued to the BLE transport.
    pub disconnects: usize,
}

/// Cloneable front end to a running session.
#[derive(Debug, Clone)]
pub struct TrackingHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    updates: broadcast::Sender<TrackingUpdate>,
    snapshot: watch::Receiver<TrackingSnapshot>,
}

impl TrackingHandle {
    pub fn start_scan(&self) -> Result<(), TrackingError> {
        self.send(SessionEvent::StartScan)
    }

    pub fn choose_peripheral(&self, peripheral: PeripheralId) -> Result<(), TrackingError> {
        self.send(SessionEvent::ChoosePeripheral(peripheral))
    }

    pub fn reconnect(&self) -> Result<(), TrackingError> {
        self.send(SessionEvent::Reconnect)
    }

    pub fn set_follow_mode(&self, enabled: bool) -> Result<(), TrackingError> {
        self.send(SessionEvent::SetFollowMode(enabled))
    }

    /// Submit a raw event.
    pub fn send(&self, event: SessionEvent) -> Result<(), TrackingError> {
        self.events
            .send(event)
            .map_err(|_| TrackingError::SessionClosed)
    }

    /// Subscribe to presentation updates.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingUpdate> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// Returns `None` if the session ends first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Option<TrackingSnapshot>
    where
        F: FnMut(&TrackingSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let result = rx.wait_for(|snapshot| predicate(snapshot)).await;
        result.ok().map(|snapshot| snapshot.clone())
    }
}

/// One position-tracking session.
pub struct TrackingSession {
    config: SessionConfig,
    map: Arc<dyn MapHost>,
    location: Arc<dyn LocationService>,
    ble: Arc<dyn BleTransport>,

    recorder: PathRecorder,
    arbiter: SourceArbiter,
    camera: CameraFollowController,
    annotations: AnnotationSynchronizer,
    link: BleLink,

    events: mpsc::WeakUnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    updates: broadcast::Sender<TrackingUpdate>,
    snapshot: watch::Sender<TrackingSnapshot>,

    tasks: CancellationToken,
    notifications: Option<CancellationToken>,
    helpers: Vec<JoinHandle<()>>,

    source_changes: usize,
    disconnects: usize,
}

impl TrackingSession {
    /// Create a session seeded at `config.seed` with no active source.
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> (Self, TrackingHandle) {
        let mut recorder = PathRecorder::with_threshold(config.seed, config.distance_threshold_m);
        recorder.set_follow_mode(config.follow_mode);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let link = BleLink::new(config.service_uuid.clone(), config.characteristic_uuid.clone());
        let initial = snapshot_of(recorder.state(), recorder.stats(), link.phase());
        let (snapshot, snapshot_rx) = watch::channel(initial);

        let session = Self {
            camera: CameraFollowController::new(config.follow_mode, config.camera_animation),
            annotations: AnnotationSynchronizer::new(
                config.marker_style.clone(),
                config.polyline_style.clone(),
            ),
            config,
            map: collaborators.map,
            location: collaborators.location,
            ble: collaborators.ble,
            recorder,
            arbiter: SourceArbiter::new(),
            link,
            events: events_tx.downgrade(),
            events_rx,
            updates: updates.clone(),
            snapshot,
            tasks: CancellationToken::new(),
            notifications: None,
            helpers: Vec::new(),
            source_changes: 0,
            disconnects: 0,
        };

        let handle = TrackingHandle {
            events: events_tx,
            updates,
            snapshot: snapshot_rx,
        };

        (session, handle)
    }

    pub fn state(&self) -> &TrackingState {
        self.recorder.state()
    }

    pub fn active_source(&self) -> PositionSource {
        self.arbiter.active()
    }

    pub fn ble_phase(&self) -> BlePhase {
        self.link.phase()
    }

    /// Bootstrap phone location and open its stream if usable.
    pub async fn start(&mut self) -> Result<(), TrackingError> {
        let mut available = ensure_location_access(self.location.as_ref()).await;

        if available {
            match self.location.location_updates().await {
                Ok(rx) => self.spawn_phone_forwarder(rx),
                Err(e) => {
                    warn!(error = %e, "Failed to open phone location stream");
                    available = false;
                }
            }
        }

        info!(
            phone_gps = available,
            seed = %self.config.seed,
            "Tracking session started"
        );
        let transition = self.arbiter.set_phone_available(available);
        self.apply_transition(transition);
        self.publish_snapshot();
        Ok(())
    }

    /// Process events until `cancel` fires or every handle is dropped, then
    /// tear down.
    ///
    /// Events still queued at that point are discarded.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<SessionSummary, TrackingError> {
        let mut failure = None;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Tracking session cancelled");
                    break;
                }

                event = self.events_rx.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle(event).await {
                            error!(error = %e, "Tracking session aborted");
                            failure = Some(e);
                            break;
                        }
                    }
                    None => {
                        debug!("All tracking handles dropped");
                        break;
                    }
                },
            }
        }

        let final_source = self.arbiter.active();
        let teardown = self.teardown().await;
        if let Some(e) = failure {
            return Err(e);
        }
        teardown?;

        let state = self.recorder.state();
        let summary = SessionSummary {
            final_position: state.current(),
            path: state.path().clone(),
            stats: self.recorder.stats(),
            final_source,
            source_changes: self.source_changes,
            disconnects: self.disconnects,
        };
        info!(
            points = summary.path.len(),
            distance_m = format!("{:.1}", summary.stats.distance_m),
            disconnects = summary.disconnects,
            "Tracking session finished"
        );
        Ok(summary)
    }

    /// Handle one event to completion.
    pub async fn handle(&mut self, event: SessionEvent) -> Result<(), TrackingError> {
        let result = match event {
            SessionEvent::Ble(event) => self.drive_ble(event).await,
            SessionEvent::StartScan => self.drive_ble(BleEvent::StartScan).await,
            SessionEvent::ChoosePeripheral(id) => {
                self.drive_ble(BleEvent::PeripheralChosen(id)).await
            }
            SessionEvent::Reconnect => match self.link.connection().map(|c| c.id.clone()) {
                Some(id) => self.drive_ble(BleEvent::PeripheralChosen(id)).await,
                None => {
                    debug!("Reconnect requested with no previous peripheral");
                    Ok(())
                }
            },
            SessionEvent::PhoneLocation(fix) => self.on_phone_fix(fix).await,
            SessionEvent::PhoneStreamEnded => {
                info!("Phone location stream ended");
                let transition = self.arbiter.set_phone_available(false);
                self.apply_transition(transition);
                Ok(())
            }
            SessionEvent::SetFollowMode(enabled) => self.set_follow_mode(enabled).await,
        };
        self.publish_snapshot();
        result
    }

    /// Feed the link and carry out its commands, looping transport results
    /// back in until the link is quiet.
    async fn drive_ble(&mut self, event: BleEvent) -> Result<(), TrackingError> {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            for command in self.link.handle(event) {
                self.execute(command, &mut pending).await?;
            }
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        command: BleCommand,
        pending: &mut VecDeque<BleEvent>,
    ) -> Result<(), TrackingError> {
        match command {
            BleCommand::StartScan => self.spawn_scan(),
            BleCommand::PresentDevices(devices) => {
                self.broadcast(TrackingUpdate::DevicesFound(devices));
            }
            BleCommand::ReportNoDevices => self.broadcast(TrackingUpdate::NoDevicesFound),
            BleCommand::Connect(id) => {
                let event = match self.ble.connect(id.clone()).await {
                    Ok(()) => BleEvent::ConnectSucceeded(id),
                    Err(e) => BleEvent::ConnectFailed(id, e),
                };
                pending.push_back(event);
            }
            BleCommand::DiscoverServices(id) => {
                let event = match self.ble.discover_services(id.clone()).await {
                    Ok(services) => BleEvent::ServicesDiscovered(id, services),
                    Err(e) => BleEvent::DiscoveryFailed(id, e),
                };
                pending.push_back(event);
            }
            BleCommand::Subscribe {
                peripheral,
                service_uuid,
                characteristic_uuid,
            } => {
                let result = self
                    .ble
                    .subscribe(peripheral.clone(), service_uuid, characteristic_uuid)
                    .await;
                let event = match result {
                    Ok(rx) => {
                        self.spawn_notification_forwarder(peripheral.clone(), rx);
                        BleEvent::SubscribeSucceeded(peripheral)
                    }
                    Err(e) => BleEvent::SubscribeFailed(peripheral, e),
                };
                pending.push_back(event);
            }
            BleCommand::Ready(_) => {
                let transition = self.arbiter.ble_connected();
                self.apply_transition(transition);
            }
            BleCommand::Position(point) => {
                self.ingest(SampleOrigin::BlePeripheral, point).await?;
            }
            BleCommand::Failed { peripheral, reason } => {
                self.stop_notifications();
                let transition = self.arbiter.ble_failed(reason.clone());
                self.apply_transition(transition);
                self.broadcast(TrackingUpdate::BleFailed { peripheral, reason });
            }
            BleCommand::Dropped { peripheral, reason } => {
                self.stop_notifications();
                let transition = self.arbiter.ble_disconnected(reason.clone());
                self.apply_transition(transition);
                self.broadcast(TrackingUpdate::BleFailed {
                    peripheral: Some(peripheral),
                    reason,
                });
            }
            BleCommand::Disconnect(id) => {
                self.stop_notifications();
                self.disconnect(id).await;
            }
        }
        Ok(())
    }

    async fn on_phone_fix(&mut self, fix: RawFix) -> Result<(), TrackingError> {
        match GeoPoint::new(fix.latitude, fix.longitude) {
            Ok(point) => self.ingest(SampleOrigin::PhoneGps, point).await,
            Err(e) => {
                debug!(error = %e, "Dropping invalid phone fix");
                Ok(())
            }
        }
    }

    async fn ingest(&mut self, origin: SampleOrigin, point: GeoPoint) -> Result<(), TrackingError> {
        if !self.arbiter.admits(origin) {
            return Ok(());
        }

        if let SampleOutcome::Accepted(point) = self.recorder.ingest(point) {
            let path = self.recorder.state().path();
            self.annotations
                .sync(point, path.points(), self.map.as_ref())
                .await?;
            self.camera
                .on_position_accepted(point, self.map.as_ref())
                .await?;
            self.broadcast(TrackingUpdate::PositionAccepted {
                point,
                source: origin.source(),
                path_len: path.len(),
            });
        }
        Ok(())
    }

    async fn set_follow_mode(&mut self, enabled: bool) -> Result<(), TrackingError> {
        let changed = self.camera.is_enabled() != enabled;
        self.recorder.set_follow_mode(enabled);
        let current = self.recorder.state().current();
        self.camera
            .set_enabled(enabled, current, self.map.as_ref())
            .await?;
        if changed {
            info!(enabled, "Follow mode changed");
            self.broadcast(TrackingUpdate::FollowModeChanged(enabled));
        }
        Ok(())
    }

    fn apply_transition(&mut self, transition: Option<SourceTransition>) {
        if let Some(transition) = transition {
            self.recorder.set_active_source(transition.to);
            self.source_changes += 1;
            self.broadcast(TrackingUpdate::SourceChanged(transition));
        }
    }

    async fn disconnect(&mut self, id: PeripheralId) {
        self.disconnects += 1;
        debug!(peripheral = %id, "Disconnecting peripheral");
        if let Err(e) = self.ble.disconnect(id).await {
            warn!(error = %e, "BLE disconnect failed");
        }
    }

    fn spawn_scan(&mut self) {
        let weak = self.events.clone();
        let emit = move |event: BleEvent| {
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(SessionEvent::Ble(event));
            }
        };
        let task = tokio::spawn(run_scan(
            Arc::clone(&self.ble),
            self.config.scan_window,
            self.tasks.child_token(),
            emit,
        ));
        self.track(task);
    }

    fn spawn_notification_forwarder(
        &mut self,
        peripheral: PeripheralId,
        mut rx: mpsc::UnboundedReceiver<LinkEvent>,
    ) {
        self.stop_notifications();
        let token = self.tasks.child_token();
        self.notifications = Some(token.clone());
        let weak = self.events.clone();

        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    next = rx.recv() => match next {
                        Some(LinkEvent::Notification(data)) => {
                            BleEvent::Notification(peripheral.clone(), data)
                        }
                        Some(LinkEvent::Disconnected(reason)) => {
                            BleEvent::LinkLost(peripheral.clone(), reason)
                        }
                        None => BleEvent::LinkLost(
                            peripheral.clone(),
                            "notification stream closed".to_string(),
                        ),
                    },
                };

                let last = matches!(event, BleEvent::LinkLost(..));
                let Some(tx) = weak.upgrade() else { return };
                if tx.send(SessionEvent::Ble(event)).is_err() || last {
                    return;
                }
            }
        });
        self.track(task);
    }

    fn spawn_phone_forwarder(&mut self, mut rx: mpsc::UnboundedReceiver<RawFix>) {
        let token = self.tasks.child_token();
        let weak = self.events.clone();

        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    next = rx.recv() => match next {
                        Some(fix) => SessionEvent::PhoneLocation(fix),
                        None => SessionEvent::PhoneStreamEnded,
                    },
                };

                let last = event == SessionEvent::PhoneStreamEnded;
                let Some(tx) = weak.upgrade() else { return };
                if tx.send(event).is_err() || last {
                    return;
                }
            }
        });
        self.track(task);
    }

    fn track(&mut self, task: JoinHandle<()>) {
        self.helpers.retain(|helper| !helper.is_finished());
        self.helpers.push(task);
    }

    fn stop_notifications(&mut self) {
        if let Some(token) = self.notifications.take() {
            token.cancel();
        }
    }

    /// Cancel helpers, release the peripheral and the annotations.
    async fn teardown(&mut self) -> Result<(), TrackingError> {
        self.tasks.cancel();
        self.events_rx.close();
        for helper in self.helpers.drain(..) {
            if let Err(e) = helper.await {
                warn!(error = %e, "Helper task failed");
            }
        }

        for command in self.link.handle(BleEvent::Teardown) {
            if let BleCommand::Disconnect(id) = command {
                self.disconnect(id).await;
            }
        }

        let transition = self.arbiter.shutdown();
        self.apply_transition(transition);

        let cleared = self.annotations.clear(self.map.as_ref()).await;
        self.publish_snapshot();
        debug!("Tracking session torn down");
        cleared.map_err(TrackingError::from)
    }

    fn broadcast(&self, update: TrackingUpdate) {
        // No receivers is fine
        let _ = self.updates.send(update);
    }

    fn publish_snapshot(&self) {
        let snapshot = snapshot_of(
            self.recorder.state(),
            self.recorder.stats(),
            self.link.phase(),
        );
        self.snapshot.send_replace(snapshot);
    }
}

fn snapshot_of(state: &TrackingState, stats: RecorderStats, ble_phase: BlePhase) -> TrackingSnapshot {
    TrackingSnapshot {
        current: state.current(),
        path_len: state.path().len(),
        active_source: state.active_source(),
        follow_mode: state.follow_mode(),
        ble_phase,
        stats,
    }
}
