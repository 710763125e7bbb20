//! HTTP transport abstraction.
//!
//! The dispatcher talks to the network and to the clock only through the two
//! traits defined here, which keeps retry behavior testable without sockets
//! or real timers.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               Dispatcher                │
//! │        (retry / backoff policy)         │
//! └─────────┬─────────────────────┬─────────┘
//!           ▼                     ▼
//! ┌───────────────────┐ ┌───────────────────┐
//! │   HttpTransport   │ │      Sleeper      │
//! │ ReqwestTransport  │ │   TokioSleeper    │
//! └───────────────────┘ └───────────────────┘
//! ```

mod http;

pub use http::{ReqwestTransport, API_KEY_HEADER};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::Result;

/// Boxed future returned by transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One authenticated JSON POST.
#[derive(Debug, Clone, Copy)]
pub struct ApiCall<'a> {
    /// Absolute endpoint URL
    pub url: &'a str,
    /// Value for the `X-Api-Key` header
    pub api_key: &'a str,
    /// JSON request body
    pub body: &'a Value,
    /// Per-attempt deadline
    pub timeout: Duration,
}

/// Pluggable HTTP backend.
///
/// Implementations must map failures onto the crate's error kinds:
/// non-2xx answers become [`crate::ScanError::Transport`] with the status,
/// deadline overruns become [`crate::ScanError::TransportTimeout`], and
/// 2xx bodies that are not JSON become [`crate::ScanError::InvalidResponse`].
pub trait HttpTransport: Send + Sync {
    /// Send the call and return the decoded JSON body of a 2xx response.
    fn post_json<'a>(&'a self, call: ApiCall<'a>) -> BoxFuture<'a, Result<Value>>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn post_json<'a>(&'a self, call: ApiCall<'a>) -> BoxFuture<'a, Result<Value>> {
        (**self).post_json(call)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Suspension used between retry attempts.
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

impl<S: Sleeper + ?Sized> Sleeper for Arc<S> {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        (**self).sleep(duration)
    }
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_waits() {
        let start = Instant::now();
        TokioSleeper.sleep(Duration::from_millis(1500)).await;
        // Paused clock auto-advances; the wait is virtual
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_arc_sleeper_delegates() {
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
        sleeper.sleep(Duration::ZERO).await;
    }
}
