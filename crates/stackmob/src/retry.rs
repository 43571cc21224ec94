//! Backoff for `503 Service Unavailable` responses.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use tracing::debug;

use crate::request::RequestDescriptor;

/// Wait used when a 503 carries no usable `Retry-After`.
pub const RETRY_WAIT: Duration = Duration::from_millis(10_000);

/// Number of retries after the first 503.
pub const RETRY_ATTEMPTS: u32 = 3;

/// How a request answered with 503 is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub default_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: RETRY_ATTEMPTS,
            default_wait: RETRY_WAIT,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            attempts: 0,
            default_wait: RETRY_WAIT,
        }
    }

    /// Delay from a `Retry-After` header given in whole seconds, else the
    /// default wait.
    pub fn retry_after(&self, headers: &HeaderMap) -> Duration {
        headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_wait)
    }

    /// Record a 503 against `request` and decide whether to resend it.
    ///
    /// The first 503 arms the budget and retries; each later one spends a
    /// retry. Returns `None` once the budget is gone.
    pub fn next_delay(&self, request: &mut RequestDescriptor, headers: &HeaderMap) -> Option<Duration> {
        let remaining = match request.retry_count {
            None => self.attempts,
            Some(count) => count.saturating_sub(1),
        };
        request.retry_count = Some(remaining);

        if remaining == 0 {
            debug!(operation = %request.operation, "Retry budget exhausted");
            return None;
        }

        let delay = self.retry_after(headers);
        debug!(operation = %request.operation, remaining, delay_ms = delay.as_millis() as u64, "Retrying after 503");
        Some(delay)
    }
}
