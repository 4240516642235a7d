//! Retry with exponential backoff for transient failures.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use rand::Rng;
use tracing::warn;

use crate::broker::dispatch::CallDispatcher;
use crate::telemetry;
use crate::types::{CallResult, JobRequest};
use crate::{Result, SluiceError};

/// Backoff policy for [`with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on the computed delay.
    pub max_delay: Duration,
    /// Randomize each delay to avoid synchronized retry storms.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Exponential delay for a zero-based retry index, capped at
    /// `max_delay`. Jitter is applied separately.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Delay to actually sleep: an upstream `Retry-After` hint overrides
    /// the backoff schedule, jitter scales the result into [0.5, 1.0).
    fn effective_delay(&self, attempt: u32, error: &SluiceError) -> Duration {
        let base = match error.retry_after() {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay_for_attempt(attempt),
        };
        if self.jitter {
            let scale: f64 = rand::thread_rng().gen_range(0.5..1.0);
            base.mul_f64(scale)
        } else {
            base
        }
    }
}

/// Run `f` until it succeeds, fails permanently, or exhausts the
/// attempt budget. Only errors whose [`is_transient`] is true are
/// retried; the last error is returned on exhaustion.
///
/// [`is_transient`]: SluiceError::is_transient
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt + 1 < config.max_attempts => {
                let delay = config.effective_delay(attempt, &error);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, retrying"
                );
                counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_string())
                    .increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Dispatcher decorator that wraps every call in [`with_retry`].
pub struct RetryingDispatcher {
    inner: Arc<dyn CallDispatcher>,
    config: RetryConfig,
}

impl RetryingDispatcher {
    pub fn new(inner: Arc<dyn CallDispatcher>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl CallDispatcher for RetryingDispatcher {
    async fn dispatch(&self, request: &JobRequest) -> Result<CallResult> {
        with_retry(&self.config, "broker.dispatch", || {
            self.inner.dispatch(request)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(500))
            .max_delay(Duration::from_secs(4))
            .jitter(false);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(4));
    }

    #[test]
    fn retry_after_hint_wins() {
        let config = RetryConfig::new().jitter(false);
        let error = SluiceError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(config.effective_delay(0, &error), Duration::from_secs(7));
    }

    #[test]
    fn jitter_stays_within_half_to_full() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(2))
            .jitter(true);
        let error = SluiceError::Timeout { seconds: 1 };
        for _ in 0..50 {
            let delay = config.effective_delay(0, &error);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay < Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_not_retried() {
        let config = RetryConfig::new().max_attempts(5).jitter(false);
        let mut calls = 0u32;
        let result: Result<()> = with_retry(&config, "test.op", || {
            calls += 1;
            async {
                Err(SluiceError::Upstream {
                    status: 404,
                    message: "not found".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
