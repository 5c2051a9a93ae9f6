//! Phone location service interface.
//!
//! Mirrors the platform location flow: check the service, ask the user to
//! enable it, check permission, ask for permission, then stream fixes.
//! [`ensure_location_access`] runs that flow once and reduces it to a single
//! yes/no answer for the source arbiter.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::BoxFuture;

/// Errors reported by the phone location service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The platform does not provide a location service at all.
    #[error("Location service unavailable")]
    Unavailable,

    /// Any other platform failure.
    #[error("Location platform error: {0}")]
    Platform(String),
}

/// Location permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    GrantedWhileInUse,
    Denied,
    DeniedForever,
}

impl PermissionStatus {
    /// True if fixes may be read.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted | Self::GrantedWhileInUse)
    }
}

/// Unvalidated fix as delivered by the platform callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Phone location operations consumed by the tracking engine.
pub trait LocationService: Send + Sync {
    /// Whether the device location service is switched on.
    fn service_enabled(&self) -> BoxFuture<'_, Result<bool, LocationError>>;

    /// Ask the user to switch the service on. Returns the new state.
    fn request_service(&self) -> BoxFuture<'_, Result<bool, LocationError>>;

    /// Current permission state.
    fn permission_status(&self) -> BoxFuture<'_, Result<PermissionStatus, LocationError>>;

    /// Prompt the user for permission. Returns the resulting state.
    fn request_permission(&self) -> BoxFuture<'_, Result<PermissionStatus, LocationError>>;

    /// Start streaming fixes. The stream ending means the service stopped.
    fn location_updates(
        &self,
    ) -> BoxFuture<'_, Result<mpsc::UnboundedReceiver<RawFix>, LocationError>>;
}

/// Run the enable/permission flow and report whether phone GPS is usable.
///
/// Any error along the way counts as "not usable"; it is logged, never
/// propagated.
pub async fn ensure_location_access(service: &dyn LocationService) -> bool {
    match check_access(service).await {
        Ok(available) => available,
        Err(e) => {
            warn!(error = %e, "Phone location check failed");
            false
        }
    }
}

async fn check_access(service: &dyn LocationService) -> Result<bool, LocationError> {
    let mut enabled = service.service_enabled().await?;
    if !enabled {
        debug!("Location service disabled, requesting");
        enabled = service.request_service().await?;
        if !enabled {
            info!("Location service not enabled by user");
            return Ok(false);
        }
    }

    let mut permission = service.permission_status().await?;
    if permission == PermissionStatus::Denied {
        debug!("Location permission denied, requesting");
        permission = service.request_permission().await?;
    }

    if !permission.is_granted() {
        info!(?permission, "Location permission not granted");
        return Ok(false);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedLocationService;

    #[tokio::test]
    async fn test_access_granted_directly() {
        let service = ScriptedLocationService::available();
        assert!(ensure_location_access(&service).await);
        assert_eq!(service.service_requests(), 0);
        assert_eq!(service.permission_requests(), 0);
    }

    #[tokio::test]
    async fn test_service_enabled_on_request() {
        let service = ScriptedLocationService::available().with_service(false, true);
        assert!(ensure_location_access(&service).await);
        assert_eq!(service.service_requests(), 1);
    }

    #[tokio::test]
    async fn test_service_refused() {
        let service = ScriptedLocationService::available().with_service(false, false);
        assert!(!ensure_location_access(&service).await);
    }

    #[tokio::test]
    async fn test_permission_granted_on_request() {
        let service = ScriptedLocationService::available()
            .with_permission(PermissionStatus::Denied, PermissionStatus::GrantedWhileInUse);
        assert!(ensure_location_access(&service).await);
        assert_eq!(service.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_forever_not_requested() {
        let service = ScriptedLocationService::available().with_permission(
            PermissionStatus::DeniedForever,
            PermissionStatus::Granted,
        );
        assert!(!ensure_location_access(&service).await);
        assert_eq!(service.permission_requests(), 0);
    }

    #[tokio::test]
    async fn test_platform_error_means_unavailable() {
        let service = ScriptedLocationService::unsupported();
        assert!(!ensure_location_access(&service).await);
    }
}
