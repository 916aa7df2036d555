//! Cross-task signals shared between the supervisor and its caller: one-shot
//! latches for manual trip and skip-wait-for-green. Cooperative shutdown
//! itself is a plain `tokio_util::sync::CancellationToken`, passed around
//! directly rather than wrapped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A one-shot latch: set by the UI task, consumed (cleared) by the
/// supervisor the next time it checks. Used for both manual-trip and
/// skip-wait-for-green; both are polled once per tick rather than awaited.
#[derive(Clone)]
pub struct Latch {
    flag: Arc<AtomicBool>,
}

impl Latch {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns `true` exactly once per `set`, then resets to unset.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}
