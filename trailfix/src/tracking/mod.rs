//! Position tracking and path recording.
//!
//! Samples from the BLE peripheral or the phone flow through one pipeline:
//!
//! ```text
//! sample ─► SourceArbiter ─► PathRecorder ─┬─► AnnotationSynchronizer
//!            (active?)       (>10 m?)      └─► CameraFollowController
//! ```
//!
//! [`TrackingSession`] wires the pieces together around a single event queue.

mod annotations;
mod arbiter;
mod camera;
pub mod export;
mod recorder;
mod session;
mod state;

pub use annotations::AnnotationSynchronizer;
pub use arbiter::{SourceArbiter, SourceTransition, TransitionReason};
pub use camera::{CameraFollowController, DEFAULT_ANIMATION_DURATION};
pub use export::path_to_geojson;
pub use recorder::{PathRecorder, RecorderStats, SampleOutcome, DEFAULT_DISTANCE_THRESHOLD_M};
pub use session::{
    Collaborators, SessionConfig, SessionEvent, SessionSummary, TrackingError, TrackingHandle,
    TrackingSession, TrackingSnapshot, TrackingUpdate,
};
pub use state::{PositionSource, SampleOrigin, TrackPath, TrackingState};
