//! Bounded exponential backoff around session establishment.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Waiting will not help, e.g. rejected credentials.
    Permanent,
    /// Worth another attempt, e.g. a flaky network.
    Transient,
}

impl ErrorClass {
    #[must_use]
    pub fn of(err: &Error) -> Self {
        if err.is_permanent() { Self::Permanent } else { Self::Transient }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay slept after the `failures`-th consecutive failure (1-based).
    #[must_use]
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The operation receives the 1-based attempt number and is responsible for
    /// releasing whatever it created before returning an error.
    ///
    /// # Errors
    /// Returns the first permanent error unchanged, or [`Error::MaxRetriesExceeded`]
    /// wrapping the last transient error.
    pub async fn run<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_classified(operation, ErrorClass::of).await
    }

    /// Like [`RetryPolicy::run`] with a caller-supplied classifier.
    ///
    /// # Errors
    /// See [`RetryPolicy::run`].
    pub async fn run_classified<F, Fut, T, C>(&self, mut operation: F, classify: C) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&Error) -> ErrorClass,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if classify(&err) == ErrorClass::Permanent {
                tracing::warn!(attempt, error = %err, "Permanent error, not retrying");
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, error = %err, "Max retries reached, giving up");
                return Err(Error::MaxRetriesExceeded {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_after(attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Connection attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
