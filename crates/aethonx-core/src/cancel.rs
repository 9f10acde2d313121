// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellation primitives for scan execution. Ported from the teacher
//! runtime's cancellation token, generalized into the engine's sole
//! root-cancellation signal (spec §4.6, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A cloneable, cheaply-shareable token used to signal scan-wide
/// cancellation (timeout, OS signal, or explicit request).
///
/// All clones share the same underlying state; cancelling one immediately
/// makes every clone observe `is_cancelled() == true`.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    /// Create a new token that is **not** cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` if [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// A future that completes once the token is cancelled; resolves
    /// immediately if already cancelled.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        loop {
            self.inner.notify.notified().await;
            if self.is_cancelled() {
                return;
            }
        }
    }

    /// Race `fut` against cancellation. Returns `None` if the token fired
    /// first, `Some(output)` if `fut` completed first.
    pub async fn race<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_not_cancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let t = CancellationToken::new();
        t.cancel();
        t.cancel();
        assert!(t.is_cancelled());
    }

    #[test]
    fn clone_shares_state() {
        let a = CancellationToken::new();
        let b = a.clone();
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let t = CancellationToken::new();
        let t2 = t.clone();
        let handle = tokio::spawn(async move {
            t2.cancelled().await;
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        t.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("did not observe cancellation in time")
            .unwrap();
    }

    #[tokio::test]
    async fn race_returns_none_on_cancel_first() {
        let t = CancellationToken::new();
        t.cancel();
        let out = t.race(async { 1u32 }).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn race_returns_some_when_future_wins() {
        let t = CancellationToken::new();
        let out = t.race(async { 42u32 }).await;
        assert_eq!(out, Some(42));
    }
}
