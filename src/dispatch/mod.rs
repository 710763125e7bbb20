//! Authenticated dispatch with retry and exponential backoff.
//!
//! # Retry schedule
//!
//! Only HTTP 429, 502, 503 and 504 are retried. Attempt `i` (0-indexed) is
//! followed by a wait of `min(base * 2^i, max)` plus uniform jitter in
//! `[0, max_jitter)`:
//!
//! | After attempt | Base wait | With jitter       |
//! |---------------|-----------|-------------------|
//! | 1             | 1s        | `[1s, 2s)`        |
//! | 2             | 2s        | `[2s, 3s)`        |
//! | 3             | 4s        | `[4s, 5s)`        |
//! | 4             | none      | last error raised |
//!
//! # Latency
//!
//! Every attempt is bounded by the request timeout, and the waits add up on
//! top of it. A call that keeps receiving retryable statuses can therefore
//! take up to `4 * timeout + 7s + 3 * jitter` of wall-clock time. The
//! dispatcher does not cap this; callers that need a hard deadline should
//! wrap the future in `tokio::time::timeout`.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::{Result, ScanError};
use crate::protocol::ScanRequest;
use crate::transport::{ApiCall, HttpTransport, Sleeper, TokioSleeper};

/// Decides whether and how long to wait before another attempt.
pub trait RetryPolicy: Send + Sync {
    /// Maximum number of retries after the first attempt.
    fn max_retries(&self) -> u32;

    /// Whether to retry after `error` on 0-indexed `attempt`.
    fn should_retry(&self, attempt: u32, error: &ScanError) -> bool;

    /// Wait before the attempt following `attempt`.
    fn backoff(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with additive jitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExponentialBackoff {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait after the first attempt, in milliseconds
    pub base_delay_ms: u64,
    /// Ceiling for the exponential part, in milliseconds
    pub max_delay_ms: u64,
    /// Exclusive upper bound of the random jitter, in milliseconds
    pub max_jitter_ms: u64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            max_jitter_ms: 1000,
        }
    }
}

impl ExponentialBackoff {
    /// Deterministic part of the wait after `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(20);
        let ms = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(ms.min(self.max_delay_ms))
    }

    /// Full wait after `attempt`, drawing jitter from `rng`.
    pub fn delay_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..self.max_jitter_ms)
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn should_retry(&self, attempt: u32, error: &ScanError) -> bool {
        error.is_retryable() && attempt < self.max_retries
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }
}

/// Sends scan requests through an [`HttpTransport`], retrying transient failures.
pub struct Dispatcher<T, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    policy: Box<dyn RetryPolicy>,
}

impl<T: HttpTransport> Dispatcher<T> {
    /// Dispatcher with the default backoff and the tokio timer.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sleeper: TokioSleeper,
            policy: Box::new(ExponentialBackoff::default()),
        }
    }
}

impl<T: HttpTransport, S: Sleeper> Dispatcher<T, S> {
    /// Replace the sleeper.
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Dispatcher<T, S2> {
        Dispatcher {
            transport: self.transport,
            sleeper,
            policy: self.policy,
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a validated request to `{baseUrl}/analyze`.
    ///
    /// Returns the decoded JSON body; shape validation is left to the caller.
    pub async fn dispatch(&self, request: &ScanRequest, credentials: &Credentials) -> Result<Value> {
        let body = request.to_body()?;
        self.dispatch_body(&body, credentials, request.timeout()).await
    }

    /// Send an arbitrary JSON body to `{baseUrl}/analyze`.
    pub async fn dispatch_body(
        &self,
        body: &Value,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Value> {
        let url = credentials.analyze_url();
        let call = ApiCall {
            url: &url,
            api_key: credentials.api_key(),
            body,
            timeout,
        };

        let mut attempt = 0;
        loop {
            debug!(
                endpoint = %url,
                attempt = attempt + 1,
                transport = self.transport.name(),
                "Sending scan request"
            );

            match self.transport.post_json(call).await {
                Ok(value) => return Ok(value),
                Err(err) if self.policy.should_retry(attempt, &err) => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        status = ?err.status(),
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Transient scan API failure, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, kind = ?err.kind(), "Scan request failed");
                    return Err(err);
                }
            }
        }
    }
}
