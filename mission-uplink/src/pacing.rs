//! Inter-frame scheduling and cancellation for upload phases.
//!
//! Uploads are fire-and-forget: nothing is read back from the receiver, so
//! the only flow control is a pause after each frame, sized to stay under the
//! receiver's input buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which frame was just sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// The leading `MISSION_COUNT`.
    CountFrame,
    /// Any per-item frame.
    Item,
}

pub trait Pacing: Send + Sync {
    /// Called after every successfully sent frame.
    fn pause(&self, after: Pause);
}

/// Sleep a fixed time after each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    pub after_count: Duration,
    pub between_items: Duration,
}

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay {
            after_count: Duration::from_millis(100),
            between_items: Duration::from_millis(50),
        }
    }
}

impl Pacing for FixedDelay {
    fn pause(&self, after: Pause) {
        let d = match after {
            Pause::CountFrame => self.after_count,
            Pause::Item => self.between_items,
        };
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

/// Send back-to-back. For tests and loopback links.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacing for NoPacing {
    fn pause(&self, _after: Pause) {}
}

// ── CancelToken ──────────────────────────────────────────────────────────────

/// Shared flag checked before every frame of an upload. Once cancelled it
/// stays cancelled; create a new token for the next upload.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
