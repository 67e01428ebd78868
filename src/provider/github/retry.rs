//! # Retry Policy
//!
//! Every GitHub operation runs through [`RetryPolicy::run`]:
//!
//! - 5xx: exponential backoff from `initial_backoff`, doubling per attempt
//! - rate limited (429, or 403 with an exhausted quota): sleep until the reset
//!   deadline, unless it is further away than `max_rate_limit_wait`
//! - any other 4xx, transport errors and local failures: returned immediately
//!
//! Both kinds of retry share the same `max_attempts` budget.

use crate::config::ControllerConfig;
use crate::observability::metrics;
use crate::provider::ApiError;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::HeaderMap;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for RetryPolicy {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            max_attempts: config.github_max_attempts.max(1),
            initial_backoff: config.github_initial_backoff(),
            max_rate_limit_wait: config.github_max_rate_limit_wait(),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn next_delay(&self, error: &ApiError, attempt: u32, now: DateTime<Utc>) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        match error {
            ApiError::Status { status, .. } if *status >= 500 => Some(self.backoff(attempt)),
            ApiError::RateLimited { reset_at, .. } => {
                let wait = match reset_at {
                    Some(reset_at) => (*reset_at - now).to_std().unwrap_or(Duration::ZERO),
                    None => self.backoff(attempt),
                };
                (wait <= self.max_rate_limit_wait).then_some(wait)
            }
            _ => None,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }

    /// Run `operation` until it succeeds or the policy gives up.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            let Some(delay) = self.next_delay(&error, attempt, Utc::now()) else {
                return Err(error);
            };
            let reason = if matches!(error, ApiError::RateLimited { .. }) {
                "rate_limited"
            } else {
                "server_error"
            };
            warn!(
                operation,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "🔄 Retrying GitHub operation"
            );
            metrics::increment_github_retries(operation, reason);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Classify a failed response as rate limited and extract its reset deadline.
///
/// `Some(None)` means rate limited without a usable deadline.
pub(crate) fn rate_limit_reset(
    status: u16,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Option<Option<DateTime<Utc>>> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let retry_after_header = header("retry-after");
    // Out-of-range values still mark the response as limited, without a deadline
    let retry_after = retry_after_header
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(TimeDelta::try_seconds)
        .and_then(|delay| now.checked_add_signed(delay));
    let quota_exhausted = header("x-ratelimit-remaining").is_some_and(|v| v.trim() == "0");
    let reset = header("x-ratelimit-reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0));

    let limited =
        status == 429 || (status == 403 && (quota_exhausted || retry_after_header.is_some()));
    limited.then(|| retry_after.or(reset))
}
