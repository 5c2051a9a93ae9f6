//! Timed scan window.
//!
//! Discovery runs in its own task so the session keeps handling
//! notifications and phone fixes while the window is open. The window is a
//! hard timeout: discovery is stopped when it elapses or when the session
//! cancels, whichever comes first.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::link::BleEvent;
use super::transport::BleTransport;

/// Length of the discovery window.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(10);

/// Run one scan window, forwarding events through `emit`.
///
/// Emits every advertisement as [`BleEvent::PeripheralDiscovered`] (the link
/// de-duplicates), then [`BleEvent::ScanWindowElapsed`] once discovery has
/// been stopped. A start failure emits [`BleEvent::ScanFailed`]. Nothing is
/// emitted after cancellation.
pub async fn run_scan<F>(
    transport: Arc<dyn BleTransport>,
    window: Duration,
    cancel: CancellationToken,
    emit: F,
) where
    F: Fn(BleEvent) + Send,
{
    let mut discoveries = match transport.start_scan().await {
        Ok(rx) => rx,
        Err(e) => {
            warn!(error = %e, "Failed to start BLE scan");
            if !cancel.is_cancelled() {
                emit(BleEvent::ScanFailed(e));
            }
            return;
        }
    };

    info!(window_ms = window.as_millis() as u64, "BLE scan started");
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    let mut advertisements = 0u64;
    let mut discovering = true;
    let cancelled = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break true,

            _ = &mut deadline => break false,

            next = discoveries.recv(), if discovering => match next {
                Some(peripheral) => {
                    advertisements += 1;
                    emit(BleEvent::PeripheralDiscovered(peripheral));
                }
                None => {
                    debug!("Discovery stream ended before the window");
                    discovering = false;
                }
            },
        }
    };

    if let Err(e) = transport.stop_scan().await {
        warn!(error = %e, "Failed to stop BLE scan");
    }

    if cancelled {
        debug!(advertisements, "BLE scan cancelled");
    } else {
        debug!(advertisements, "BLE scan window elapsed");
        emit(BleEvent::ScanWindowElapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::{BleError, DiscoveredPeripheral};
    use crate::sim::ScriptedBleTransport;
    use parking_lot::Mutex;

    fn collect() -> (Arc<Mutex<Vec<BleEvent>>>, impl Fn(BleEvent) + Send) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |event| sink.lock().push(event))
    }

    #[tokio::test]
    async fn test_window_forwards_and_stops() {
        let transport = Arc::new(ScriptedBleTransport::new().with_peripherals(vec![
            DiscoveredPeripheral::new("A", Some("ESP32-GPS"), -50),
            DiscoveredPeripheral::new("A", Some("ESP32-GPS"), -49),
        ]));
        let (events, emit) = collect();

        run_scan(
            transport.clone(),
            Duration::from_millis(30),
            CancellationToken::new(),
            emit,
        )
        .await;

        let events = events.lock();
        assert_eq!(events.len(), 3);
        assert_eq!(events.last(), Some(&BleEvent::ScanWindowElapsed));
        assert_eq!(transport.scans_stopped(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_discovery_silently() {
        let transport = Arc::new(ScriptedBleTransport::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (events, emit) = collect();

        run_scan(transport.clone(), DEFAULT_SCAN_WINDOW, cancel, emit).await;

        assert!(events.lock().is_empty());
        assert_eq!(transport.scans_stopped(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_reported() {
        let transport = Arc::new(
            ScriptedBleTransport::new()
                .with_scan_error(BleError::AdapterUnavailable("powered off".to_string())),
        );
        let (events, emit) = collect();

        run_scan(
            transport,
            Duration::from_millis(10),
            CancellationToken::new(),
            emit,
        )
        .await;

        assert!(matches!(
            events.lock().as_slice(),
            [BleEvent::ScanFailed(BleError::AdapterUnavailable(_))]
        ));
    }
}
