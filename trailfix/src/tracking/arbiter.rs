//! Position source arbiter.
//!
//! Decides which subsystem may move the tracked position. Two inputs feed it:
//! whether the BLE peripheral is fully resolved and streaming, and whether the
//! phone location service is usable.
//!
//! # Resolution
//!
//! ```text
//! ble_ready                      -> BlePeripheral
//! !ble_ready && phone_available  -> PhoneGps
//! otherwise                      -> None
//! ```
//!
//! BLE readiness is only ever granted by an explicit connect; a failure or a
//! dropped link clears it and the phone takes over on the same cycle. There
//! is no automatic promotion back to BLE.

use tracing::{debug, info};

use super::state::{PositionSource, SampleOrigin};

/// Why the active source changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionReason {
    /// Phone location service became usable.
    PhoneAvailable,
    /// Phone location service became unusable (denied, disabled, stream ended).
    PhoneUnavailable,
    /// BLE peripheral connected with service and characteristic resolved.
    BleConnected,
    /// BLE connect, service discovery or subscription failed.
    BleFailed(String),
    /// An established BLE link dropped.
    BleDisconnected(String),
    /// Session teardown.
    Teardown,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PhoneAvailable => write!(f, "phone location available"),
            Self::PhoneUnavailable => write!(f, "phone location unavailable"),
            Self::BleConnected => write!(f, "BLE peripheral connected"),
            Self::BleFailed(reason) => write!(f, "BLE failed: {}", reason),
            Self::BleDisconnected(reason) => write!(f, "BLE disconnected: {}", reason),
            Self::Teardown => write!(f, "session teardown"),
        }
    }
}

/// A change of active source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTransition {
    pub from: PositionSource,
    pub to: PositionSource,
    pub reason: TransitionReason,
}

/// Source arbitration state machine.
#[derive(Debug, Default)]
pub struct SourceArbiter {
    ble_ready: bool,
    phone_available: bool,
    active: PositionSource,
}

impl SourceArbiter {
    /// Create an arbiter with no usable source.
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently authorized source.
    pub fn active(&self) -> PositionSource {
        self.active
    }

    pub fn phone_available(&self) -> bool {
        self.phone_available
    }

    pub fn ble_ready(&self) -> bool {
        self.ble_ready
    }

    /// Whether a sample from `origin` may reach the recorder.
    pub fn admits(&self, origin: SampleOrigin) -> bool {
        let admitted = self.active == origin.source();
        if !admitted {
            debug!(?origin, active = %self.active, "Sample from inactive source ignored");
        }
        admitted
    }

    /// Record the outcome of the phone location check or a stream change.
    pub fn set_phone_available(&mut self, available: bool) -> Option<SourceTransition> {
        self.phone_available = available;
        let reason = if available {
            TransitionReason::PhoneAvailable
        } else {
            TransitionReason::PhoneUnavailable
        };
        self.resolve(reason)
    }

    /// BLE link fully established.
    pub fn ble_connected(&mut self) -> Option<SourceTransition> {
        self.ble_ready = true;
        self.resolve(TransitionReason::BleConnected)
    }

    /// BLE connect/discovery/subscribe failed.
    ///
    /// Resolves even when BLE was never ready, so a first failed connect
    /// still moves `None` to the phone.
    pub fn ble_failed(&mut self, reason: impl Into<String>) -> Option<SourceTransition> {
        self.ble_ready = false;
        self.resolve(TransitionReason::BleFailed(reason.into()))
    }

    /// Established BLE link dropped.
    pub fn ble_disconnected(&mut self, reason: impl Into<String>) -> Option<SourceTransition> {
        self.ble_ready = false;
        self.resolve(TransitionReason::BleDisconnected(reason.into()))
    }

    /// Drop every source at teardown.
    pub fn shutdown(&mut self) -> Option<SourceTransition> {
        self.ble_ready = false;
        self.phone_available = false;
        self.resolve(TransitionReason::Teardown)
    }

    fn resolve(&mut self, reason: TransitionReason) -> Option<SourceTransition> {
        let next = if self.ble_ready {
            PositionSource::BlePeripheral
        } else if self.phone_available {
            PositionSource::PhoneGps
        } else {
            PositionSource::None
        };

        if next == self.active {
            return None;
        }

        let transition = SourceTransition {
            from: self.active,
            to: next,
            reason,
        };
        self.active = next;
        info!(
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            "Active position source changed"
        );
        Some(transition)
    }
}
