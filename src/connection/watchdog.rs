//! Idle watchdog

use std::future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};

/// Fallback horizon for timeouts too large to add to `Instant::now()`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline that every successful I/O step pushes forward.
///
/// A zero timeout disarms the watchdog entirely.
pub(crate) struct IdleTimer {
    timeout: Duration,
    deadline: Mutex<Instant>,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Mutex::new(deadline_after(timeout)),
        }
    }

    pub fn is_armed(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Reschedule the deadline to now + timeout
    pub fn touch(&self) {
        if self.is_armed() {
            *self.deadline.lock() = deadline_after(self.timeout);
        }
    }

    pub fn deadline(&self) -> Instant {
        *self.deadline.lock()
    }

    /// Resolves once the live deadline has passed. Never resolves when disarmed.
    pub async fn expired(&self) {
        if !self.is_armed() {
            return future::pending().await;
        }

        loop {
            sleep_until(self.deadline()).await;

            // I/O may have moved the deadline while we slept
            if self.deadline() <= Instant::now() {
                return;
            }
        }
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
}
