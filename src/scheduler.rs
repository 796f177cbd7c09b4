//! Cooperative cancellation and fixed-interval ticking for background loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Process-shutdown signal shared between the owner and background tasks.
///
/// Cancelling wakes every task currently waiting in [`cancelled`](Self::cancelled)
/// and every future wait returns immediately.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Fires every `period` until shutdown.
///
/// Ticks are measured from the end of the previous one, so a slow pass
/// delays the next tick instead of causing a burst.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    shutdown: ShutdownToken,
}

impl Ticker {
    pub fn new(period: Duration, shutdown: ShutdownToken) -> Self {
        Self { period, shutdown }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick. Returns `false` once shutdown was requested,
    /// interrupting an in-flight wait.
    pub async fn tick(&mut self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.period) => !self.shutdown.is_cancelled(),
            _ = self.shutdown.cancelled() => false,
        }
    }
}
