//! Idempotent close signaling
//!
//! Every closable transport resource (socket, listening endpoint, in-flight
//! connect) is backed by a [`CloseSignal`]: closing is a one-way latch that
//! any number of owners may trip, and blocked operations observe it through
//! `select!` on [`CloseSignal::closed`].

use std::sync::Arc;
use tokio::sync::watch;

/// One-way close latch shared between a resource and its cancellers
#[derive(Debug, Clone)]
pub struct CloseSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseSignal {
    /// Create a new, open signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trip the latch. Safe to call any number of times from any owner.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the latch has been tripped
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the latch is tripped. Resolves immediately if it already
    /// was.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_is_idempotent() {
        let signal = CloseSignal::new();
        assert!(!signal.is_closed());

        signal.close();
        signal.close();
        assert!(signal.is_closed());
    }

    #[tokio::test]
    async fn test_closed_unblocks_waiter() {
        let signal = CloseSignal::new();
        let waiter = signal.clone();

        let handle = tokio::spawn(async move { waiter.closed().await });
        signal.close();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_resolves_immediately_when_already_closed() {
        let signal = CloseSignal::new();
        signal.close();
        signal.closed().await;
    }
}
