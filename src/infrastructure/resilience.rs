//! Resilience patterns for external API calls

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::errors::VulnerabilityError;

/// Retry configuration for exponential backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Upper bound for a single attempt
    pub attempt_timeout: Duration,
    /// Delay after the first failure, doubled for every further failure
    pub initial_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: Duration::from_secs(10),
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl From<&crate::config::RetrySettings> for RetryConfig {
    fn from(settings: &crate::config::RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            attempt_timeout: Duration::from_secs(settings.attempt_timeout_seconds),
            initial_delay: Duration::from_millis(settings.initial_backoff_ms),
        }
    }
}

impl RetryConfig {
    /// Backoff before the attempt following failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1u32 << exponent)
    }
}

/// Execute an operation with per-attempt timeouts and exponential backoff.
///
/// Each attempt receives a child of `parent`. When an attempt times out the
/// child is cancelled, the in-flight future is dropped and the timeout counts
/// as a failed attempt. Cancelling `parent` stops the executor with
/// [`VulnerabilityError::Cancelled`] and is never retried.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    parent: &CancellationToken,
    mut operation: F,
) -> Result<T, VulnerabilityError>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, VulnerabilityError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if parent.is_cancelled() {
            return Err(VulnerabilityError::Cancelled);
        }

        let token = parent.child_token();
        let outcome = tokio::select! {
            biased;
            _ = parent.cancelled() => {
                token.cancel();
                return Err(VulnerabilityError::Cancelled);
            }
            result = tokio::time::timeout(config.attempt_timeout, operation(token.clone())) => result,
        };

        let error = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(_)) if parent.is_cancelled() => return Err(VulnerabilityError::Cancelled),
            Ok(Err(error)) => error,
            Err(_) => {
                token.cancel();
                VulnerabilityError::Timeout {
                    seconds: config.attempt_timeout.as_secs(),
                }
            }
        };

        if attempt >= max_attempts {
            tracing::warn!(attempt, error = %error, "Giving up after final attempt");
            return Err(error);
        }

        let delay = config.delay_after(attempt);
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );

        tokio::select! {
            biased;
            _ = parent.cancelled() => return Err(VulnerabilityError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
