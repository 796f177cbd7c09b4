//! Bounded exponential backoff.
//!
//! Used by the OpenAI embedding client and by callers that (re)connect to an
//! upstream collaborator such as the real-time transport. The delay before
//! retry `n` (1-based) is `min(base * 2^(n-1), cap)`; once `max_retries`
//! retries have failed the last error is returned unchanged.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_retries,
            base,
            cap,
        }
    }

    /// Five connection attempts, 1s base, 30s ceiling.
    pub fn transport() -> Self {
        Self::new(4, Duration::from_secs(1), Duration::from_secs(30))
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        self.base.saturating_mul(1u32 << shift).min(self.cap)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1), Duration::from_secs(32))
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Every error is treated as retryable; callers that need to fail fast on
/// some errors should classify inside `op` and loop themselves.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: BackoffPolicy,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
