//! Host collaborator interfaces.
//!
//! The tracking engine never renders anything itself. It drives a host map
//! widget through [`MapHost`] and reads the phone's own fixes through
//! [`LocationService`]. Both are dyn-compatible so a session can hold them as
//! `Arc<dyn _>` regardless of the platform binding behind them.
//!
//! # Annotation Handles
//!
//! The host hands out opaque [`AnnotationId`]s when a marker or polyline is
//! created. The engine keeps at most one of each kind alive per map view and
//! mutates them in place; see [`crate::tracking::AnnotationSynchronizer`].

pub mod location;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::geo::GeoPoint;

pub use location::{LocationError, LocationService, PermissionStatus, RawFix};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by the host map widget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The map widget has not finished initializing.
    #[error("Map host not initialized")]
    NotReady,

    /// The handle does not refer to a live annotation.
    #[error("Unknown annotation handle: {0}")]
    UnknownAnnotation(AnnotationId),

    /// Any other failure reported by the platform map API.
    #[error("Map host error: {0}")]
    Platform(String),
}

/// Opaque handle to an annotation owned by the host map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationId(pub u64);

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Camera orientation that tracking must preserve while re-centering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            zoom: 14.0,
            bearing: 0.0,
            pitch: 0.0,
        }
    }
}

/// Appearance of the current-location marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    /// Icon name registered with the map style.
    pub icon: String,
    /// Icon scale factor.
    pub size: f64,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            icon: "location-dot".to_string(),
            size: 1.0,
        }
    }
}

/// Appearance of the traveled-path polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct PolylineStyle {
    /// Line color as `#rrggbb`.
    pub color: String,
    /// Line width in pixels.
    pub width: f64,
}

impl Default for PolylineStyle {
    fn default() -> Self {
        Self {
            color: "#e4572e".to_string(),
            width: 4.0,
        }
    }
}

/// Map widget operations consumed by the tracking engine.
///
/// Every method is a suspension point: the session awaits it inside a single
/// event handler, so no two calls from one session ever overlap.
pub trait MapHost: Send + Sync {
    /// Create the current-location marker.
    fn create_marker(
        &self,
        point: GeoPoint,
        style: &MarkerStyle,
    ) -> BoxFuture<'_, Result<AnnotationId, HostError>>;

    /// Move an existing marker.
    fn update_marker(&self, handle: AnnotationId, point: GeoPoint)
        -> BoxFuture<'_, Result<(), HostError>>;

    /// Remove a marker from the map.
    fn delete_marker(&self, handle: AnnotationId) -> BoxFuture<'_, Result<(), HostError>>;

    /// Create the path polyline.
    fn create_polyline(
        &self,
        points: Vec<GeoPoint>,
        style: &PolylineStyle,
    ) -> BoxFuture<'_, Result<AnnotationId, HostError>>;

    /// Replace the vertices of an existing polyline.
    fn update_polyline(
        &self,
        handle: AnnotationId,
        points: Vec<GeoPoint>,
    ) -> BoxFuture<'_, Result<(), HostError>>;

    /// Remove a polyline from the map.
    fn delete_polyline(&self, handle: AnnotationId) -> BoxFuture<'_, Result<(), HostError>>;

    /// Read the current zoom/bearing/pitch.
    fn camera_state(&self) -> BoxFuture<'_, Result<CameraState, HostError>>;

    /// Animate the viewport center to `center` with the given orientation.
    fn animate_camera(
        &self,
        center: GeoPoint,
        camera: CameraState,
        duration: Duration,
    ) -> BoxFuture<'_, Result<(), HostError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_display() {
        let err = HostError::UnknownAnnotation(AnnotationId(7));
        assert_eq!(err.to_string(), "Unknown annotation handle: #7");
        assert_eq!(HostError::NotReady.to_string(), "Map host not initialized");
    }

    #[test]
    fn test_default_styles() {
        assert_eq!(MarkerStyle::default().icon, "location-dot");
        assert_eq!(PolylineStyle::default().width, 4.0);
        assert_eq!(CameraState::default().zoom, 14.0);
    }
}
