//! Backoff for database connections made while the service starts up.
//!
//! Only errors the caller classifies as transient are retried, so a malformed
//! connection string fails on the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times, and how far apart, a startup connection is reattempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one; `0` disables retrying
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Shorten each delay to a random 50-100% so replicas don't reconnect in lockstep
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            jitter: true,
        }
    }

    /// A single attempt
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry `retry` (1-based): doubles each time up to `max_delay`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn sleep_for(&self, retry: u32) -> Duration {
        let delay = self.delay_for(retry);
        if self.jitter { jittered(delay) } else { delay }
    }
}

impl Default for RetryPolicy {
    /// 3 retries, 100ms doubling up to 5s
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), Duration::from_secs(5))
    }
}

/// Run `operation` until it succeeds, `is_transient` rejects its error, or
/// the policy runs out of retries. The last error is returned.
///
/// # Example
/// ```ignore
/// let client = retry_if(
///     &config.retry,
///     MongoError::is_transient,
///     || connect_from_config(&config),
/// )
/// .await?;
/// ```
pub async fn retry_if<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retries = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    debug!(retries, "Connected after retrying");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_transient(&err) {
            warn!(error = %err, "Permanent failure, not retrying");
            return Err(err);
        }
        if retries >= policy.max_retries {
            warn!(attempts = retries + 1, error = %err, "Giving up");
            return Err(err);
        }

        retries += 1;
        let delay = policy.sleep_for(retries);
        debug!(
            retry = retries,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

fn jittered(delay: Duration) -> Duration {
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    let percent = 50 + RandomState::new().hash_one(std::time::SystemTime::now()) % 51;
    delay * percent as u32 / 100
}
