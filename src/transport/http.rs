//! reqwest-backed transport.

use reqwest::{redirect, Client};
use serde_json::Value;

use super::{ApiCall, BoxFuture, HttpTransport};
use crate::error::{Result, ScanError};
use crate::protocol::ApiErrorBody;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// HTTP transport over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh client.
    ///
    /// Redirects are not followed, so the `X-Api-Key` header never reaches
    /// a host other than the validated base URL. A 3xx surfaces as a
    /// non-retryable transport error.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("securevector-connector/{}", crate::VERSION))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ScanError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Reuse an existing client (connection pool, proxies, custom TLS).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_json<'a>(&'a self, call: ApiCall<'a>) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let timeout_secs = u32::try_from(call.timeout.as_secs()).unwrap_or(u32::MAX);

            let response = self
                .client
                .post(call.url)
                .header(API_KEY_HEADER, call.api_key)
                .json(call.body)
                .timeout(call.timeout)
                .send()
                .await
                .map_err(|e| classify(e, timeout_secs))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| classify(e, timeout_secs))?;

            if !status.is_success() {
                let message = ApiErrorBody::parse(&text)
                    .map(|body| body.summary())
                    .unwrap_or_else(|| {
                        status
                            .canonical_reason()
                            .unwrap_or("request failed")
                            .to_string()
                    });
                return Err(ScanError::http(status.as_u16(), message));
            }

            serde_json::from_str(&text).map_err(|e| {
                ScanError::InvalidResponse(format!("Response body is not valid JSON: {e}"))
            })
        })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

fn classify(err: reqwest::Error, timeout_secs: u32) -> ScanError {
    if err.is_timeout() {
        ScanError::TransportTimeout { timeout_secs }
    } else {
        ScanError::from(err)
    }
}
