//! Bounded retries and deadlines for async calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::CommonError;

/// How often, and how patiently, to retry a fallible call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, the first one included. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause before the second attempt.
    pub initial_delay: Duration,
    /// Cap on any pause.
    pub max_delay: Duration,
    /// Growth factor between successive pauses.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// One retry after a fixed pause.
    pub fn once_after(delay: Duration) -> Self {
        Self {
            max_attempts: 2,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Pause to observe before attempt number `attempt`, counting from 1.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(retries_so_far) = attempt.checked_sub(2) else {
            return Duration::ZERO;
        };
        let scaled = self.initial_delay.mul_f64(self.backoff_multiplier.powi(retries_so_far as i32));
        scaled.min(self.max_delay)
    }
}

/// Call `operation` until it succeeds or the attempts run out.
///
/// The error of the final attempt is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let limit = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let pause = config.delay_for_attempt(attempt);
        if !pause.is_zero() {
            debug!(attempt, ?pause, "Waiting before next attempt");
            sleep(pause).await;
        }

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= limit {
            return Err(err);
        }
        warn!(attempt, limit, error = %err, "Attempt failed, will retry");
        attempt += 1;
    }
}

/// Await `operation`, giving up once `limit` has elapsed.
pub async fn with_timeout<T, Fut>(limit: Duration, operation: Fut) -> Result<T, CommonError>
where
    Fut: Future<Output = T>,
{
    timeout(limit, operation)
        .await
        .map_err(|_| CommonError::Timeout(limit))
}
