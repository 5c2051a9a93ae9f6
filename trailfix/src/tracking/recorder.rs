//! Sample filter and path recorder.
//!
//! Accepts validated samples, suppresses GPS jitter and appends accepted
//! samples to the traveled path.
//!
//! # Acceptance Rule
//!
//! A candidate is accepted iff its haversine distance from the last accepted
//! point exceeds the distance threshold (10 m by default), or the path still
//! holds only its seed. The bootstrap case forces the first real sample in
//! even when it sits right on top of the seed.
//!
//! Rejection is silent: no state change, no error. Jitter is expected.

use tracing::{debug, trace};

use super::state::{PositionSource, TrackingState};
use crate::geo::GeoPoint;

/// Default minimum movement between recorded points, in meters.
pub const DEFAULT_DISTANCE_THRESHOLD_M: f64 = 10.0;

/// Result of offering a sample to the recorder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// The sample moved the position and was appended to the path.
    Accepted(GeoPoint),
    /// The sample was within the jitter threshold and was discarded.
    Rejected,
}

impl SampleOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Counters kept alongside the path.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecorderStats {
    pub accepted: u64,
    pub rejected: u64,
    /// Sum of distances between consecutive path points.
    pub distance_m: f64,
}

/// Owns the tracking state and applies the distance filter.
#[derive(Debug)]
pub struct PathRecorder {
    state: TrackingState,
    distance_threshold_m: f64,
    stats: RecorderStats,
}

impl PathRecorder {
    /// Create a recorder seeded at `seed` with the default threshold.
    pub fn new(seed: GeoPoint) -> Self {
        Self::with_threshold(seed, DEFAULT_DISTANCE_THRESHOLD_M)
    }

    /// Create a recorder with a custom threshold in meters.
    pub fn with_threshold(seed: GeoPoint, distance_threshold_m: f64) -> Self {
        Self {
            state: TrackingState::new(seed, false),
            distance_threshold_m,
            stats: RecorderStats::default(),
        }
    }

    /// Offer a candidate sample.
    pub fn ingest(&mut self, candidate: GeoPoint) -> SampleOutcome {
        let previous = self.state.previous();
        let moved = previous.distance_to(&candidate);
        let bootstrap = self.state.path().len() == 1;

        if moved > self.distance_threshold_m || bootstrap {
            self.state.commit(candidate);
            self.stats.accepted += 1;
            self.stats.distance_m += moved;
            debug!(
                lat = format!("{:.6}", candidate.latitude()),
                lon = format!("{:.6}", candidate.longitude()),
                moved_m = format!("{:.1}", moved),
                bootstrap,
                path_len = self.state.path().len(),
                "Sample accepted"
            );
            SampleOutcome::Accepted(candidate)
        } else {
            self.stats.rejected += 1;
            trace!(moved_m = format!("{:.1}", moved), "Sample within jitter threshold");
            SampleOutcome::Rejected
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    pub fn distance_threshold_m(&self) -> f64 {
        self.distance_threshold_m
    }

    pub(crate) fn set_follow_mode(&mut self, enabled: bool) {
        self.state.set_follow_mode(enabled);
    }

    pub(crate) fn set_active_source(&mut self, source: PositionSource) {
        self.state.set_active_source(source);
    }
}
