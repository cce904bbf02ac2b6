//! One-shot shutdown broadcast.
//!
//! A [`ShutdownSignal`] has two states, armed and fired, and a single allowed
//! transition. Firing wakes every task currently parked in
//! [`ShutdownSignal::wait`], and every later call to `wait` completes
//! immediately. Firing again is a no-op.

// ============================================================================
// Imports
// ============================================================================

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

// ============================================================================
// ShutdownSignal
// ============================================================================

/// Idempotent broadcast used to unblock all waiters at once.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    /// Set once, never cleared.
    fired: AtomicBool,
    /// Wakes tasks parked in `wait`.
    notify: Notify,
}

impl ShutdownSignal {
    /// Creates an armed signal.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal.
    ///
    /// Returns `true` for the call that performed the transition and `false`
    /// for every later call.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Returns `true` once the signal has fired.
    #[inline]
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Completes once the signal has fired.
    ///
    /// Cancel-safe: dropping the future before completion loses nothing.
    pub async fn wait(&self) {
        let mut notified = pin!(self.notify.notified());
        // Register before checking the flag so a concurrent `fire` cannot slip
        // between the check and the await.
        notified.as_mut().enable();

        if self.is_fired() {
            return;
        }

        notified.await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_fire_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_fired());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_fired());
    }

    #[test]
    fn test_wait_pending_until_fired() {
        let signal = ShutdownSignal::new();
        let mut wait = task::spawn(signal.wait());

        assert_pending!(wait.poll());
        signal.fire();
        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }

    #[test]
    fn test_wait_after_fire_is_immediate() {
        let signal = ShutdownSignal::new();
        signal.fire();
        let mut wait = task::spawn(signal.wait());
        assert_ready!(wait.poll());
    }

    #[tokio::test]
    async fn test_fire_releases_every_waiter() {
        let signal = Arc::new(ShutdownSignal::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let signal = Arc::clone(&signal);
            handles.push(tokio::spawn(async move { signal.wait().await }));
        }

        tokio::task::yield_now().await;
        signal.fire();

        for handle in handles {
            timeout(Duration::from_secs(1), handle)
                .await
                .expect("waiter released")
                .expect("waiter task completed");
        }
    }
}
