use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Caller-side deadline and cancellation for a single call.
///
/// Cloning shares the cancellation signal. A context with no deadline falls
/// back to the client's default timeout.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every [`CallContext`] derived from the call that created it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CallContext {
    /// No deadline, no cancellation.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a fresh cancellation signal, replacing any existing one.
    #[must_use]
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel = Some(rx);
        (self, CancelHandle { tx: Arc::new(tx) })
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancelled. Never resolves for contexts without a signal,
    /// or whose handle was dropped without cancelling.
    pub(crate) async fn cancelled(&self) {
        if let Some(rx) = &self.cancel {
            let mut rx = rx.clone();
            if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_resolves_waiters() {
        let (ctx, handle) = CallContext::background().with_cancel();
        let waiter = ctx.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        assert!(!ctx.is_cancelled());
        handle.cancel();
        task.await.unwrap();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (ctx, handle) = CallContext::background().with_cancel();
        drop(handle);
        let result = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_timeout_sets_deadline() {
        assert!(CallContext::background().deadline().is_none());
        let ctx = CallContext::background().with_timeout(Duration::from_secs(1));
        assert!(ctx.deadline().is_some());
    }
}
