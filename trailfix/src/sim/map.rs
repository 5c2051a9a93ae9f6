//! In-memory map host that records every call.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::geo::GeoPoint;
use crate::host::{AnnotationId, BoxFuture, CameraState, HostError, MapHost, MarkerStyle, PolylineStyle};

/// One successful call on [`RecordingMapHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum MapCall {
    CreateMarker {
        handle: AnnotationId,
        point: GeoPoint,
    },
    UpdateMarker {
        handle: AnnotationId,
        point: GeoPoint,
    },
    DeleteMarker(AnnotationId),
    CreatePolyline {
        handle: AnnotationId,
        points: Vec<GeoPoint>,
    },
    UpdatePolyline {
        handle: AnnotationId,
        points: Vec<GeoPoint>,
    },
    DeletePolyline(AnnotationId),
    AnimateCamera {
        center: GeoPoint,
        camera: CameraState,
        duration: Duration,
    },
}

#[derive(Debug)]
struct MapState {
    calls: Vec<MapCall>,
    next_id: u64,
    markers: HashMap<AnnotationId, GeoPoint>,
    polylines: HashMap<AnnotationId, Vec<GeoPoint>>,
    camera: CameraState,
    center: Option<GeoPoint>,
    ready: bool,
    failure: Option<String>,
}

/// Map host double.
///
/// Hands out sequential annotation ids starting at 1. Camera reads are not
/// recorded as calls. Failed calls are not recorded either.
#[derive(Debug)]
pub struct RecordingMapHost {
    state: Mutex<MapState>,
}

impl Default for RecordingMapHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingMapHost {
    /// An initialized map with the default camera.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MapState {
                calls: Vec::new(),
                next_id: 1,
                markers: HashMap::new(),
                polylines: HashMap::new(),
                camera: CameraState::default(),
                center: None,
                ready: true,
                failure: None,
            }),
        }
    }

    /// A map whose camera is not initialized yet.
    pub fn uninitialized() -> Self {
        let host = Self::new();
        host.state.lock().ready = false;
        host
    }

    /// A map whose every call fails with `HostError::Platform(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        let host = Self::new();
        host.state.lock().failure = Some(message.into());
        host
    }

    pub fn with_camera(self, camera: CameraState) -> Self {
        self.state.lock().camera = camera;
        self
    }

    /// Mark the camera as initialized.
    pub fn set_ready(&self) {
        self.state.lock().ready = true;
    }

    pub fn calls(&self) -> Vec<MapCall> {
        self.state.lock().calls.clone()
    }

    /// Every camera animation as `(center, orientation, duration)`.
    pub fn camera_animations(&self) -> Vec<(GeoPoint, CameraState, Duration)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MapCall::AnimateCamera {
                    center,
                    camera,
                    duration,
                } => Some((*center, *camera, *duration)),
                _ => None,
            })
            .collect()
    }

    pub fn live_markers(&self) -> usize {
        self.state.lock().markers.len()
    }

    pub fn live_polylines(&self) -> usize {
        self.state.lock().polylines.len()
    }

    /// Position of the (single) live marker.
    pub fn marker_position(&self) -> Option<GeoPoint> {
        self.state.lock().markers.values().next().copied()
    }

    /// Vertices of the (single) live polyline.
    pub fn polyline_points(&self) -> Option<Vec<GeoPoint>> {
        self.state.lock().polylines.values().next().cloned()
    }

    /// Last center the camera was animated to.
    pub fn camera_center(&self) -> Option<GeoPoint> {
        self.state.lock().center
    }

    fn check(state: &MapState) -> Result<(), HostError> {
        match &state.failure {
            Some(message) => Err(HostError::Platform(message.clone())),
            None => Ok(()),
        }
    }

    fn next_handle(state: &mut MapState) -> AnnotationId {
        let handle = AnnotationId(state.next_id);
        state.next_id += 1;
        handle
    }

    fn do_create_marker(&self, point: GeoPoint) -> Result<AnnotationId, HostError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        let handle = Self::next_handle(&mut state);
        state.markers.insert(handle, point);
        state.calls.push(MapCall::CreateMarker { handle, point });
        Ok(handle)
    }

    fn do_update_marker(&self, handle: AnnotationId, point: GeoPoint) -> Result<(), HostError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        let slot = state
            .markers
            .get_mut(&handle)
            .ok_or(HostError::UnknownAnnotation(handle))?;
        *slot = point;
        state.calls.push(MapCall::UpdateMarker { handle, point });
        Ok(())
    }

    fn do_delete_marker(&self, handle: AnnotationId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state
            .markers
            .remove(&handle)
            .ok_or(HostError::UnknownAnnotation(handle))?;
        state.calls.push(MapCall::DeleteMarker(handle));
        Ok(())
    }

    fn do_create_polyline(&self, points: Vec<GeoPoint>) -> Result<AnnotationId, HostError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        let handle = Self::next_handle(&mut state);
        state.polylines.insert(handle, points.clone());
        state.calls.push(MapCall::CreatePolyline { handle, points });
        Ok(handle)
    }

    fn do_update_polyline(
        &self,
        handle: AnnotationId,
        points: Vec<GeoPoint>,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        let slot = state
            .polylines
            .get_mut(&handle)
            .ok_or(HostError::UnknownAnnotation(handle))?;
        *slot = points.clone();
        state.calls.push(MapCall::UpdatePolyline { handle, points });
        Ok(())
    }

    fn do_delete_polyline(&self, handle: AnnotationId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        state
            .polylines
            .remove(&handle)
            .ok_or(HostError::UnknownAnnotation(handle))?;
        state.calls.push(MapCall::DeletePolyline(handle));
        Ok(())
    }

    fn do_camera_state(&self) -> Result<CameraState, HostError> {
        let state = self.state.lock();
        Self::check(&state)?;
        if !state.ready {
            return Err(HostError::NotReady);
        }
        Ok(state.camera)
    }

    fn do_animate_camera(
        &self,
        center: GeoPoint,
        camera: CameraState,
        duration: Duration,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock();
        Self::check(&state)?;
        if !state.ready {
            return Err(HostError::NotReady);
        }
        state.camera = camera;
        state.center = Some(center);
        state.calls.push(MapCall::AnimateCamera {
            center,
            camera,
            duration,
        });
        Ok(())
    }
}

impl MapHost for RecordingMapHost {
    fn create_marker(
        &self,
        point: GeoPoint,
        _style: &MarkerStyle,
    ) -> BoxFuture<'_, Result<AnnotationId, HostError>> {
        let result = self.do_create_marker(point);
        Box::pin(async move { result })
    }

    fn update_marker(
        &self,
        handle: AnnotationId,
        point: GeoPoint,
    ) -> BoxFuture<'_, Result<(), HostError>> {
        let result = self.do_update_marker(handle, point);
        Box::pin(async move { result })
    }

    fn delete_marker(&self, handle: AnnotationId) -> BoxFuture<'_, Result<(), HostError>> {
        let result = self.do_delete_marker(handle);
        Box::pin(async move { result })
    }

    fn create_polyline(
        &self,
        points: Vec<GeoPoint>,
        _style: &PolylineStyle,
    ) -> BoxFuture<'_, Result<AnnotationId, HostError>> {
        let result = self.do_create_polyline(points);
        Box::pin(async move { result })
    }

    fn update_polyline(
        &self,
        handle: AnnotationId,
        points: Vec<GeoPoint>,
    ) -> BoxFuture<'_, Result<(), HostError>> {
        let result = self.do_update_polyline(handle, points);
        Box::pin(async move { result })
    }

    fn delete_polyline(&self, handle: AnnotationId) -> BoxFuture<'_, Result<(), HostError>> {
        let result = self.do_delete_polyline(handle);
        Box::pin(async move { result })
    }

    fn camera_state(&self) -> BoxFuture<'_, Result<CameraState, HostError>> {
        let result = self.do_camera_state();
        Box::pin(async move { result })
    }

    fn animate_camera(
        &self,
        center: GeoPoint,
        camera: CameraState,
        duration: Duration,
    ) -> BoxFuture<'_, Result<(), HostError>> {
        let result = self.do_animate_camera(center, camera, duration);
        Box::pin(async move { result })
    }
}
