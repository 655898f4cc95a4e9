//! A cooperative cancellation signal for the crate's suspension points
//! (`Session::solve`, swarm upload/download, batch learning). Built on
//! `tokio::sync::watch` rather than a dedicated cancellation-token crate,
//! since a `watch<bool>` receiver is all any of these call sites need: a
//! cheap, cloneable "has cancellation been requested yet" check, plus an
//! async wait for the next time it flips.

use tokio::sync::watch;

/// Held by whoever can request cancellation (the host assistant's turn
/// loop, typically). Cloning shares the same underlying flag.
#[derive(Clone)]
pub struct CancellationToken {
    tx: watch::Sender<bool>,
}

/// Held by the suspension point being cancelled. Cheap to clone; each
/// clone observes the same flag independently.
#[derive(Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Create a fresh token/signal pair, starting uncancelled.
    pub fn new() -> (Self, CancellationSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancellationSignal { rx })
    }

    /// Request cancellation. Idempotent; later calls are no-ops.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancellationSignal {
    /// Non-blocking check, for a synchronous step boundary (e.g. between
    /// `solve()` retry attempts).
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; already-cancelled signals
    /// resolve immediately. Meant to sit on the other side of a
    /// `tokio::select!` from the work being raced against it.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_a_pending_wait() {
        let (token, mut signal) = CancellationToken::new();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn(async move {
            signal.cancelled().await;
            signal.is_cancelled()
        });

        token.cancel();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn already_cancelled_signal_resolves_immediately() {
        let (token, mut signal) = CancellationToken::new();
        token.cancel();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }
}
