//! Bounded retry for opening provider streams.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::LlmError;

/// How often and how patiently a stream is reopened after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_backoff_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 1000,
            max_backoff_ms: 8000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Exponential backoff: `min(base * 2^(attempt - 1), max)`.
///
/// `attempt` is 1-based.
pub fn exponential_backoff(attempt: u32, base_backoff_ms: u64, max_backoff_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let delay = base_backoff_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(max_backoff_ms))
}

/// Runs `connect` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut connect: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0u32;
    loop {
        match connect().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempt += 1;
                if !error.is_retryable() || attempt > policy.max_retries {
                    warn!(
                        attempt,
                        max = policy.max_retries,
                        error = %error,
                        "giving up on provider connection"
                    );
                    return Err(error);
                }

                let delay =
                    exponential_backoff(attempt, policy.base_backoff_ms, policy.max_backoff_ms);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retryable provider connection error, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
