//! Core state types for position tracking.
//!
//! - [`PositionSource`] - which subsystem is authorized to move the position
//! - [`SampleOrigin`] - which subsystem produced a given sample
//! - [`TrackPath`] - append-only traveled path
//! - [`TrackingState`] - current/previous position, path, follow mode, source

use serde::Serialize;

use crate::geo::GeoPoint;

/// The single GPS origin currently authorized to update tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PositionSource {
    /// External BLE GPS peripheral.
    BlePeripheral,
    /// The phone's built-in location service.
    PhoneGps,
    /// No usable source.
    #[default]
    None,
}

impl std::fmt::Display for PositionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlePeripheral => write!(f, "BLE"),
            Self::PhoneGps => write!(f, "Phone GPS"),
            Self::None => write!(f, "None"),
        }
    }
}

/// Subsystem a sample arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOrigin {
    BlePeripheral,
    PhoneGps,
}

impl SampleOrigin {
    /// The active source that is allowed to forward samples of this origin.
    pub fn source(&self) -> PositionSource {
        match self {
            Self::BlePeripheral => PositionSource::BlePeripheral,
            Self::PhoneGps => PositionSource::PhoneGps,
        }
    }
}

/// Ordered, append-only sequence of accepted points.
///
/// Seeded with one point before any sample arrives. There is no removal API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPath {
    points: Vec<GeoPoint>,
}

impl TrackPath {
    /// Create a path holding only the seed point.
    pub fn seeded(seed: GeoPoint) -> Self {
        Self { points: vec![seed] }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Never true: a path always holds its seed.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&GeoPoint> {
        self.points.last()
    }

    /// Total length along the path in meters.
    pub fn length_m(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }

    pub(crate) fn push(&mut self, point: GeoPoint) {
        self.points.push(point);
    }
}

/// Tracking state owned by one session.
///
/// `current` and `previous` are only ever written together with a path
/// append, in [`TrackingState::commit`].
#[derive(Debug, Clone)]
pub struct TrackingState {
    current: GeoPoint,
    previous: GeoPoint,
    path: TrackPath,
    follow_mode: bool,
    active_source: PositionSource,
}

impl TrackingState {
    /// Create state centered on `seed`.
    pub fn new(seed: GeoPoint, follow_mode: bool) -> Self {
        Self {
            current: seed,
            previous: seed,
            path: TrackPath::seeded(seed),
            follow_mode,
            active_source: PositionSource::None,
        }
    }

    pub fn current(&self) -> GeoPoint {
        self.current
    }

    /// Last point that passed the distance filter (or the seed).
    pub fn previous(&self) -> GeoPoint {
        self.previous
    }

    pub fn path(&self) -> &TrackPath {
        &self.path
    }

    pub fn follow_mode(&self) -> bool {
        self.follow_mode
    }

    pub fn active_source(&self) -> PositionSource {
        self.active_source
    }

    pub(crate) fn set_follow_mode(&mut self, enabled: bool) {
        self.follow_mode = enabled;
    }

    pub(crate) fn set_active_source(&mut self, source: PositionSource) {
        self.active_source = source;
    }

    /// Record an accepted point.
    pub(crate) fn commit(&mut self, point: GeoPoint) {
        self.current = point;
        self.previous = point;
        self.path.push(point);
    }
}
