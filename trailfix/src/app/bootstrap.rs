//! Application bootstrap implementation.
//!
//! `TrailfixApp` runs the startup sequence in a fixed order:
//!
//! 1. Validate configuration (a missing access token stops here)
//! 2. Build the tracking session around the platform collaborators
//! 3. Bootstrap phone location, which settles the initial source
//! 4. Spawn the session task
//!
//! Shutdown cancels the session and waits for its teardown to finish, so
//! the BLE peripheral is released and the map annotations are gone by the
//! time `shutdown()` returns.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::config::AppConfig;
use super::error::AppError;
use crate::tracking::{
    Collaborators, SessionSummary, TrackingError, TrackingHandle, TrackingSession,
};

/// A running tracking application.
pub struct TrailfixApp {
    config: AppConfig,
    handle: TrackingHandle,
    cancel: CancellationToken,
    task: JoinHandle<Result<SessionSummary, TrackingError>>,
}

impl TrailfixApp {
    /// Start tracking with the given configuration and collaborators.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(config: AppConfig, collaborators: Collaborators) -> Result<Self, AppError> {
        info!(
            style = %config.map_style,
            token = %config.masked_token(),
            seed = %config.session.seed,
            "Starting trailfix"
        );

        let (mut session, handle) = TrackingSession::new(config.session.clone(), collaborators);
        session.start().await?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(session.run(cancel.child_token()));

        Ok(Self {
            config,
            handle,
            cancel,
            task,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle for issuing commands and subscribing to updates.
    pub fn handle(&self) -> &TrackingHandle {
        &self.handle
    }

    /// Token that stops the session when cancelled (e.g. from a signal handler).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the session and wait for teardown.
    pub async fn shutdown(self) -> Result<SessionSummary, AppError> {
        info!("Shutting down trailfix");
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the session to end on its own (cancellation or failure).
    pub async fn wait(self) -> Result<SessionSummary, AppError> {
        let summary = self
            .task
            .await
            .map_err(|e| AppError::TaskFailed(e.to_string()))??;
        Ok(summary)
    }
}
