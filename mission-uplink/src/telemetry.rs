//! Periodic link telemetry.
//!
//! A background thread samples the session every interval while it is
//! connected and publishes a [`LinkSample`] to every subscriber. Sampling
//! goes through the session's state lock, so it never observes a
//! half-sent frame; it never writes to the transport.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::Serialize;

use crate::session::{SessionStatus, UploadSession};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSample {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub status: SessionStatus,
}

impl LinkSample {
    pub fn take(session: &UploadSession) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        LinkSample { timestamp_ms, status: session.status() }
    }
}

type Subscribers = Arc<Mutex<Vec<Sender<LinkSample>>>>;

pub struct TelemetryTicker {
    subscribers: Subscribers,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TelemetryTicker {
    /// Start sampling `session` every `interval`.
    pub fn spawn(session: Arc<UploadSession>, interval: Duration) -> Self {
        let subscribers: Subscribers = Arc::default();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let subs = Arc::clone(&subscribers);
        let handle = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                // Explicit stop or ticker dropped.
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            if !session.is_connected() {
                continue;
            }
            let sample = LinkSample::take(&session);
            let mut subs = subs.lock().unwrap_or_else(PoisonError::into_inner);
            subs.retain(|tx| tx.send(sample.clone()).is_ok());
            debug!("Published link sample to {} subscribers", subs.len());
        });

        TelemetryTicker { subscribers, stop_tx: Some(stop_tx), handle: Some(handle) }
    }

    /// New receiver for every subsequent sample. Dropping it unsubscribes.
    pub fn subscribe(&self) -> Receiver<LinkSample> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Telemetry thread panicked");
            }
        }
    }
}

impl Drop for TelemetryTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
