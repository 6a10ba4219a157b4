//! Signal-of-Stop: cooperative cancellation primitive.
//!
//! A thread-safe, async-aware token that can be cloned across tasks,
//! awaited for cancellation, and raced against futures in `select!`
//! patterns. Cancelling any clone notifies all waiters.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default, Clone)]
pub struct SignalOfStop {
    internal: Arc<SharedState>,
}

#[derive(Debug, Default)]
struct SharedState {
    closing: AtomicBool,
    notify: Notify,
}

impl SignalOfStop {
    /// Create a new, uncancelled signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to all waiters.
    ///
    /// After this call, `cancelled()` returns `true` and all pending
    /// `wait()` futures complete.
    pub fn cancel(&self) {
        self.internal.closing.store(true, Ordering::Release);
        self.internal.notify.notify_waiters();
    }

    /// Check if cancellation has been signaled.
    pub fn cancelled(&self) -> bool {
        self.internal.closing.load(Ordering::Acquire)
    }

    /// Wait for cancellation to be signaled.
    ///
    /// Returns immediately if already cancelled.
    pub async fn wait(&self) {
        while !self.cancelled() {
            let notified = self.internal.notify.notified();
            if self.cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let sos = SignalOfStop::new();
        assert!(!sos.cancelled());

        let waiter = sos.clone();
        let handle = tokio::spawn(async move {
            waiter.wait().await;
            true
        });

        sos.cancel();
        assert!(sos.cancelled());
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_cancelled() {
        let sos = SignalOfStop::new();
        sos.cancel();
        sos.wait().await;
    }

    #[test]
    fn clones_share_state() {
        let a = SignalOfStop::new();
        let b = a.clone();
        b.cancel();
        assert!(a.cancelled());
    }
}
