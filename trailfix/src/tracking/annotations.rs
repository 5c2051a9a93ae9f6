//! Annotation synchronizer.
//!
//! Keeps exactly one current-location marker and one path polyline on the
//! host map in step with the recorder. Handles are created lazily on the
//! first accepted position, updated in place afterwards, and deleted at
//! teardown.

use tracing::{debug, warn};

use crate::geo::GeoPoint;
use crate::host::{AnnotationId, HostError, MapHost, MarkerStyle, PolylineStyle};

/// Owner of the marker and polyline handles for one map view.
#[derive(Debug, Default)]
pub struct AnnotationSynchronizer {
    marker: Option<AnnotationId>,
    polyline: Option<AnnotationId>,
    marker_style: MarkerStyle,
    polyline_style: PolylineStyle,
}

impl AnnotationSynchronizer {
    pub fn new(marker_style: MarkerStyle, polyline_style: PolylineStyle) -> Self {
        Self {
            marker: None,
            polyline: None,
            marker_style,
            polyline_style,
        }
    }

    pub fn marker(&self) -> Option<AnnotationId> {
        self.marker
    }

    pub fn polyline(&self) -> Option<AnnotationId> {
        self.polyline
    }

    /// Bring the marker and polyline up to date with the recorder.
    pub async fn sync(
        &mut self,
        current: GeoPoint,
        path: &[GeoPoint],
        host: &dyn MapHost,
    ) -> Result<(), HostError> {
        match self.marker {
            Some(handle) => host.update_marker(handle, current).await?,
            None => {
                let handle = host.create_marker(current, &self.marker_style).await?;
                debug!(%handle, "Location marker created");
                self.marker = Some(handle);
            }
        }

        match self.polyline {
            Some(handle) => host.update_polyline(handle, path.to_vec()).await?,
            None => {
                let handle = host
                    .create_polyline(path.to_vec(), &self.polyline_style)
                    .await?;
                debug!(%handle, points = path.len(), "Path polyline created");
                self.polyline = Some(handle);
            }
        }

        Ok(())
    }

    /// Delete both annotations, if present.
    ///
    /// Handles are forgotten even when the host reports an error, so a
    /// second call never targets a stale handle. The first error is returned.
    pub async fn clear(&mut self, host: &dyn MapHost) -> Result<(), HostError> {
        let mut first_error = None;

        if let Some(handle) = self.marker.take() {
            if let Err(e) = host.delete_marker(handle).await {
                warn!(%handle, error = %e, "Failed to delete location marker");
                first_error.get_or_insert(e);
            }
        }

        if let Some(handle) = self.polyline.take() {
            if let Err(e) = host.delete_polyline(handle).await {
                warn!(%handle, error = %e, "Failed to delete path polyline");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
