//! Cooperative cancellation signal for pipeline and module scopes.
//!
//! Two independent scopes use the same mechanism: the orchestrator holds a
//! pipeline-wide signal, and each module runner holds a module-scoped one
//! fired on timeout. Modules receive a token and are expected to check it
//! at natural suspension points; the runner only guarantees it signals and
//! waits a bounded grace period, not that the module stops instantly.

use tokio::sync::watch;

/// Owning side of a cancellation signal.
///
/// Dropping the signal without calling [`CancelSignal::cancel`] leaves all
/// tokens permanently un-cancelled.
#[derive(Debug)]
pub struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    /// Creates a new, un-fired signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Returns a token observing this signal.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Fires the signal. Idempotent.
    pub fn cancel(&self) {
        // send_replace never fails even with zero receivers
        self.tx.send_replace(true);
    }

    /// Returns `true` if the signal has been fired.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation signal, cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Returns `true` if the signal has been fired.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal fires.
    ///
    /// If the owning [`CancelSignal`] is dropped without firing, this
    /// future never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }

    /// Returns a token that never fires, for callers outside any
    /// cancellable scope.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Leak the sender so the channel stays open
        std::mem::forget(tx);
        Self { rx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_signal_starts_unfired() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
        assert!(!signal.token().is_cancelled());
    }

    #[test]
    fn test_cancel_is_observed_by_all_tokens() {
        let signal = CancelSignal::new();
        let a = signal.token();
        let b = a.clone();

        signal.cancel();
        assert!(signal.is_cancelled());
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let signal = CancelSignal::new();
        signal.cancel();
        signal.cancel();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves_after_fire() {
        let signal = CancelSignal::new();
        let token = signal.token();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves_if_already_fired() {
        let signal = CancelSignal::new();
        signal.cancel();
        let token = signal.token();

        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already-fired token should resolve immediately");
    }

    #[tokio::test]
    async fn test_never_token_does_not_fire() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());

        let result = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(result.is_err(), "never-token must not resolve");
    }

    #[tokio::test]
    async fn test_dropped_signal_without_fire_never_resolves() {
        let token = {
            let signal = CancelSignal::new();
            signal.token()
        };

        let result = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(result.is_err());
    }
}
