use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::constants::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS};
use crate::error::{DispatchError, WalletPoolError};

/// Structured classification of errors the retry policy may retry.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for WalletPoolError {
    fn is_transient(&self) -> bool {
        matches!(self, WalletPoolError::WalletBusy { .. })
    }
}

impl Retryable for DispatchError {
    fn is_transient(&self) -> bool {
        match self {
            DispatchError::Pool(e) => e.is_transient(),
            DispatchError::NonceConflict(_) => true,
            _ => false,
        }
    }
}

impl Retryable for anyhow::Error {
    fn is_transient(&self) -> bool {
        if let Some(e) = self.downcast_ref::<DispatchError>() {
            return e.is_transient();
        }
        self.downcast_ref::<WalletPoolError>()
            .is_some_and(|e| e.is_transient())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `operation` until it succeeds, fails with a non-transient error, or
    /// `max_attempts` transient failures have happened. The operation must be
    /// safe to invoke more than once.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt + 1 >= max_attempts {
                        tracing::warn!("Giving up after {} attempts: {}", max_attempts, e);
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    tracing::info!(
                        "Transient failure on attempt {}: {}, retrying in {}ms",
                        attempt + 1,
                        e,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// `retry_with_backoff(op, 3, 500)` retries transient failures after 500ms
/// then 1000ms.
pub async fn retry_with_backoff<T, E, F, Fut>(operation: F, max_attempts: u32, base_delay_ms: u64) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(base_delay_ms),
    }
    .run(operation)
    .await
}
