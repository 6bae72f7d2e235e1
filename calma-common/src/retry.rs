//! Retry with exponential backoff
//!
//! One parametrized retry loop shared by every call site that talks to a
//! flaky dependency (storage signed URLs, HEAD checks, media subprocess,
//! SQLite lock contention). Call sites supply their own attempt ceiling and
//! delays rather than sharing a global policy: retrying a cheap metadata
//! call is not the same as re-running a subprocess.

use crate::{Error, Result};
use rand::Rng;
use std::time::Duration;

/// Backoff parameters for one call site
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Uniform random jitter added to each delay
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Cheap metadata operations: many fast attempts
    pub fn quick(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: Duration::from_millis(300),
        }
    }

    /// Expensive operations (subprocess runs): few slow attempts
    pub fn heavy(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(500),
        }
    }

    fn delay_for(&self, retry_index: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry_index))
            .min(self.max_delay);
        let jitter_ms = if self.jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64)
        };
        exp + Duration::from_millis(jitter_ms)
    }
}

/// Run `operation`, retrying on errors accepted by `retryable`.
///
/// Errors rejected by the predicate fail immediately. The error from the
/// final attempt is returned once the ceiling is reached.
pub async fn with_backoff<F, Fut, T, P>(
    operation_name: &str,
    policy: RetryPolicy,
    retryable: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !retryable(&err) {
                    return Err(err);
                }

                if attempt >= policy.attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %err,
                        "Operation failed: retry attempts exhausted"
                    );
                    return Err(err);
                }

                let delay = policy.delay_for(attempt - 1);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
