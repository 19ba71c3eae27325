//! # Bounded Retry
//!
//! Retries an async operation at a fixed interval until it succeeds, fails with
//! a non-retryable error, or the overall timeout elapses. The last error is
//! returned unchanged; nothing is swallowed.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, warn};

/// Overall time budget and fixed sleep between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Policy performing exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

/// Run `op` until success or until the policy's timeout is exhausted.
///
/// `is_retryable` decides which errors are transient; any other error is
/// returned immediately.
pub async fn retry_with_timeout<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let start = Instant::now();
    let mut attempt: u32 = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                if start.elapsed() >= policy.timeout {
                    if attempt > 1 {
                        error!(
                            operation = %operation,
                            attempts = attempt,
                            timeout_ms = policy.timeout.as_millis() as u64,
                            error = %e,
                            "Retry timeout exceeded after one or more retry attempts"
                        );
                    }
                    return Err(e);
                }
                warn!(
                    operation = %operation,
                    attempt = attempt,
                    retry_in_ms = policy.interval.as_millis() as u64,
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(policy.interval).await;
                attempt += 1;
            }
        }
    }
}
