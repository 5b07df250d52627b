// Bounded exponential backoff for transient collaborator failures
// (complaint store writes, audit sink delivery).

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Backoff unit: retry `n` waits `base_delay_ms * 2^n` before jitter.
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 25,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts; handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: false,
        }
    }

    /// Waits between attempts, one per retry.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        let with_jitter = self.jitter;
        ExponentialBackoff::from_millis(2)
            .factor(self.base_delay_ms)
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .take(self.max_attempts.max(1) as usize - 1)
            .map(move |delay| if with_jitter { jitter(delay) } else { delay })
    }
}

/// The last error after every attempt was used up, or after a non-retryable error.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub error: E,
}

/// Run `operation` until it succeeds, `should_retry` rejects its error, or
/// `config.max_attempts` is reached.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let attempts = AtomicU32::new(0);

    let result = RetryIf::spawn(
        config.backoff(),
        || {
            attempts.fetch_add(1, Ordering::Relaxed);
            operation()
        },
        |error: &E| {
            let retry = should_retry(error);
            let attempt = attempts.load(Ordering::Relaxed);
            if retry && attempt < max_attempts {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %error,
                    "Retryable failure, backing off"
                );
            }
            retry
        },
    )
    .await;

    let attempts = attempts.load(Ordering::Relaxed);
    match result {
        Ok(value) => {
            if attempts > 1 {
                debug!(operation = operation_name, attempts, "Operation succeeded after retry");
            }
            Ok(value)
        }
        Err(error) => Err(RetryExhausted { attempts, error }),
    }
}
