//! Cooperative cancellation for planning requests.
//!
//! The planner checks the token between objectives. A cancelled request
//! returns `PathwayError::Cancelled` and nothing it planned so far is kept.
//!
//! ```ignore
//! let source = CancellationTokenSource::new();
//! let token = source.token();
//!
//! let handle = tokio::spawn(async move { planner.generate(&profile, &targets, &token).await });
//! source.cancel();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Shared view of a cancellation flag.
///
/// Clones observe the same state.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// A token nobody can cancel, for callers that never cancel.
    pub fn none() -> Self {
        Self::new()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub async fn wait_cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::none()
    }
}

/// Owner side of a [`CancellationToken`].
#[derive(Clone, Debug)]
pub struct CancellationTokenSource {
    token: CancellationToken,
}

impl CancellationTokenSource {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels every token handed out by this source.
    pub fn cancel(&self) {
        self.token.cancelled.store(true, Ordering::SeqCst);
        self.token.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for CancellationTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_token_initially_not_cancelled() {
        let source = CancellationTokenSource::new();
        assert!(!source.token().is_cancelled());
        assert!(!CancellationToken::none().is_cancelled());
    }

    #[test]
    fn test_cancel_reaches_all_clones() {
        let source = CancellationTokenSource::new();
        let token1 = source.token();
        let token2 = token1.clone();

        source.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
        assert!(source.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_cancelled_wakes() {
        let source = CancellationTokenSource::new();
        let token = source.token();

        let waiter = tokio::spawn(async move { token.wait_cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        source.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_after_cancel_returns_immediately() {
        let source = CancellationTokenSource::new();
        source.cancel();
        source.token().wait_cancelled().await;
    }
}
