//! Scripted phone location service.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::host::location::{LocationError, LocationService, PermissionStatus, RawFix};
use crate::host::BoxFuture;

#[derive(Debug)]
struct LocationScript {
    supported: bool,
    service_enabled: bool,
    service_after_request: bool,
    permission: PermissionStatus,
    permission_after_request: PermissionStatus,
    service_requests: usize,
    permission_requests: usize,
    feed: Option<mpsc::UnboundedSender<RawFix>>,
    pending: Vec<RawFix>,
    ended: bool,
}

/// Location service double.
///
/// Fixes pushed before the stream is opened are queued and delivered when
/// [`LocationService::location_updates`] is called.
#[derive(Debug)]
pub struct ScriptedLocationService {
    script: Mutex<LocationScript>,
}

impl ScriptedLocationService {
    /// Service on, permission granted.
    pub fn available() -> Self {
        Self {
            script: Mutex::new(LocationScript {
                supported: true,
                service_enabled: true,
                service_after_request: true,
                permission: PermissionStatus::Granted,
                permission_after_request: PermissionStatus::Granted,
                service_requests: 0,
                permission_requests: 0,
                feed: None,
                pending: Vec::new(),
                ended: false,
            }),
        }
    }

    /// Every call fails with [`LocationError::Unavailable`].
    pub fn unsupported() -> Self {
        let service = Self::available();
        service.script.lock().supported = false;
        service
    }

    /// Service state before and after `request_service`.
    pub fn with_service(self, initial: bool, after_request: bool) -> Self {
        {
            let mut script = self.script.lock();
            script.service_enabled = initial;
            script.service_after_request = after_request;
        }
        self
    }

    /// Permission before and after `request_permission`.
    pub fn with_permission(self, initial: PermissionStatus, after_request: PermissionStatus) -> Self {
        {
            let mut script = self.script.lock();
            script.permission = initial;
            script.permission_after_request = after_request;
        }
        self
    }

    /// Deliver a fix (or queue it until the stream opens).
    pub fn push_fix(&self, latitude: f64, longitude: f64) {
        let fix = RawFix::new(latitude, longitude);
        let mut script = self.script.lock();
        if script.ended {
            return;
        }
        match &script.feed {
            Some(feed) => {
                let _ = feed.send(fix);
            }
            None => script.pending.push(fix),
        }
    }

    /// Stop the stream, as when the user switches location off.
    pub fn end_stream(&self) {
        let mut script = self.script.lock();
        script.ended = true;
        script.feed = None;
        script.pending.clear();
    }

    pub fn is_streaming(&self) -> bool {
        self.script
            .lock()
            .feed
            .as_ref()
            .is_some_and(|feed| !feed.is_closed())
    }

    pub fn service_requests(&self) -> usize {
        self.script.lock().service_requests
    }

    pub fn permission_requests(&self) -> usize {
        self.script.lock().permission_requests
    }

    fn supported(script: &LocationScript) -> Result<(), LocationError> {
        if script.supported {
            Ok(())
        } else {
            Err(LocationError::Unavailable)
        }
    }

    fn do_request_service(&self) -> Result<bool, LocationError> {
        let mut script = self.script.lock();
        Self::supported(&script)?;
        script.service_requests += 1;
        script.service_enabled = script.service_after_request;
        Ok(script.service_enabled)
    }

    fn do_request_permission(&self) -> Result<PermissionStatus, LocationError> {
        let mut script = self.script.lock();
        Self::supported(&script)?;
        script.permission_requests += 1;
        script.permission = script.permission_after_request;
        Ok(script.permission)
    }

    fn do_location_updates(&self) -> Result<mpsc::UnboundedReceiver<RawFix>, LocationError> {
        let mut script = self.script.lock();
        Self::supported(&script)?;
        let (tx, rx) = mpsc::unbounded_channel();
        if !script.ended {
            for fix in script.pending.drain(..) {
                let _ = tx.send(fix);
            }
            script.feed = Some(tx);
        }
        Ok(rx)
    }
}

impl LocationService for ScriptedLocationService {
    fn service_enabled(&self) -> BoxFuture<'_, Result<bool, LocationError>> {
        let script = self.script.lock();
        let result = Self::supported(&script).map(|()| script.service_enabled);
        Box::pin(async move { result })
    }

    fn request_service(&self) -> BoxFuture<'_, Result<bool, LocationError>> {
        let result = self.do_request_service();
        Box::pin(async move { result })
    }

    fn permission_status(&self) -> BoxFuture<'_, Result<PermissionStatus, LocationError>> {
        let script = self.script.lock();
        let result = Self::supported(&script).map(|()| script.permission);
        Box::pin(async move { result })
    }

    fn request_permission(&self) -> BoxFuture<'_, Result<PermissionStatus, LocationError>> {
        let result = self.do_request_permission();
        Box::pin(async move { result })
    }

    fn location_updates(
        &self,
    ) -> BoxFuture<'_, Result<mpsc::UnboundedReceiver<RawFix>, LocationError>> {
        let result = self.do_location_updates();
        Box::pin(async move { result })
    }
}
