//! Camera follow controller.
//!
//! When follow mode is on, every accepted position re-centers the map. The
//! host's zoom, bearing and pitch are read back and re-applied so tracking
//! never changes the camera angle the user chose.

use std::time::Duration;

use tracing::{debug, trace};

use crate::geo::GeoPoint;
use crate::host::{HostError, MapHost};

/// Default duration of the re-centering animation.
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(500);

/// Drives the host camera while follow mode is on.
#[derive(Debug, Clone)]
pub struct CameraFollowController {
    enabled: bool,
    animation: Duration,
    animations_requested: u64,
}

impl Default for CameraFollowController {
    fn default() -> Self {
        Self::new(false, DEFAULT_ANIMATION_DURATION)
    }
}

impl CameraFollowController {
    pub fn new(enabled: bool, animation: Duration) -> Self {
        Self {
            enabled,
            animation,
            animations_requested: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of animations the host accepted.
    pub fn animations_requested(&self) -> u64 {
        self.animations_requested
    }

    /// Toggle follow mode.
    ///
    /// Turning it on animates to `current` right away; turning it off does
    /// nothing to the camera.
    pub async fn set_enabled(
        &mut self,
        enabled: bool,
        current: GeoPoint,
        host: &dyn MapHost,
    ) -> Result<(), HostError> {
        let was_enabled = self.enabled;
        self.enabled = enabled;
        if enabled && !was_enabled {
            self.follow(current, host).await?;
        }
        Ok(())
    }

    /// React to a newly accepted position.
    pub async fn on_position_accepted(
        &mut self,
        point: GeoPoint,
        host: &dyn MapHost,
    ) -> Result<(), HostError> {
        if !self.enabled {
            return Ok(());
        }
        self.follow(point, host).await
    }

    async fn follow(&mut self, point: GeoPoint, host: &dyn MapHost) -> Result<(), HostError> {
        let camera = match host.camera_state().await {
            Ok(camera) => camera,
            Err(HostError::NotReady) => {
                trace!("Map not initialized, skipping camera follow");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match host.animate_camera(point, camera, self.animation).await {
            Ok(()) => {
                self.animations_requested += 1;
                debug!(
                    lat = format!("{:.6}", point.latitude()),
                    lon = format!("{:.6}", point.longitude()),
                    zoom = camera.zoom,
                    "Camera following position"
                );
                Ok(())
            }
            Err(HostError::NotReady) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CameraState;
    use crate::sim::{MapCall, RecordingMapHost};

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[tokio::test]
    async fn test_disabled_does_nothing() {
        let host = RecordingMapHost::new();
        let mut camera = CameraFollowController::default();

        camera
            .on_position_accepted(point(1.0, 1.0), &host)
            .await
            .unwrap();
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_follow_preserves_orientation() {
        let orientation = CameraState {
            zoom: 16.5,
            bearing: 42.0,
            pitch: 30.0,
        };
        let host = RecordingMapHost::new().with_camera(orientation);
        let mut camera = CameraFollowController::new(true, DEFAULT_ANIMATION_DURATION);

        camera
            .on_position_accepted(point(6.95, 79.90), &host)
            .await
            .unwrap();

        assert_eq!(
            host.camera_animations(),
            vec![(point(6.95, 79.90), orientation, Duration::from_millis(500))]
        );
        assert_eq!(camera.animations_requested(), 1);
    }

    #[tokio::test]
    async fn test_enable_animates_immediately() {
        let host = RecordingMapHost::new();
        let mut camera = CameraFollowController::default();

        camera.set_enabled(true, point(1.0, 2.0), &host).await.unwrap();
        assert_eq!(host.camera_animations().len(), 1);

        // Already on: no second animation
        camera.set_enabled(true, point(1.0, 2.0), &host).await.unwrap();
        assert_eq!(host.camera_animations().len(), 1);
    }

    #[tokio::test]
    async fn test_disable_has_no_camera_effect() {
        let host = RecordingMapHost::new();
        let mut camera = CameraFollowController::new(true, DEFAULT_ANIMATION_DURATION);

        camera.set_enabled(false, point(1.0, 2.0), &host).await.unwrap();
        assert!(host.calls().is_empty());
        assert!(!camera.is_enabled());
    }

    #[tokio::test]
    async fn test_uninitialized_map_is_noop() {
        let host = RecordingMapHost::uninitialized();
        let mut camera = CameraFollowController::new(true, DEFAULT_ANIMATION_DURATION);

        let result = camera.on_position_accepted(point(1.0, 2.0), &host).await;
        assert!(result.is_ok());
        assert_eq!(camera.animations_requested(), 0);
        assert!(!host
            .calls()
            .iter()
            .any(|c| matches!(c, MapCall::AnimateCamera { .. })));
    }
}
