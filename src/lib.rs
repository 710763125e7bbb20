//! # SecureVector - Prompt Scanning Connector
//!
//! Sends text prompts from a workflow-automation host to the SecureVector
//! AI-security scanning API and turns the reply into a pass/block decision.
//!
//! ## Features
//!
//! - **Input hygiene**: control-character stripping, NFC normalization, length bound
//! - **Runtime credential checks**: key format, HTTPS only, `securevector.io` allow-list
//! - **Resilient dispatch**: exponential backoff with jitter on 429/502/503/504
//! - **Strict response validation**: every field checked before it is trusted
//! - **Blocking policy**: verdict, score threshold and risk-level conditions
//! - **Secret redaction**: every surfaced error is scrubbed of keys and auth headers
//!
//! ## Pipeline
//!
//! ```text
//! Host item                                               Scanning API
//!    |                                                          |
//!    |-- sanitize prompt                                        |
//!    |-- validate credentials                                   |
//!    |-- build request                                          |
//!    |---------------- POST /analyze (X-Api-Key) -------------->|
//!    |<--------------- verdict / score / rules -----------------|
//!    |-- validate + normalize                                   |
//!    |-- evaluate policy                                        |
//!    v                                                          |
//! NormalizedResult  or  ItemFailure (redacted)
//! ```
//!
//! ### Error Kinds
//!
//! | Kind                 | Retried                 | Surfaced as                  |
//! |----------------------|-------------------------|------------------------------|
//! | `EmptyInput`         | no                      | prompt required              |
//! | `InvalidCredentials` | no                      | reason for rejection         |
//! | `InvalidRequest`     | no                      | `Invalid data: ...`          |
//! | `InvalidResponse`    | no                      | `Invalid data: ...`          |
//! | `TransportTimeout`   | no                      | `Scan request timed out`     |
//! | `TransportError`     | 429, 502, 503, 504 only | redacted HTTP/network detail |
//! | `PolicyBlock`        | no                      | risk level, score, threats   |
//!
//! ## Quick Start
//!
//! ### Single Scan
//!
//! ```rust,ignore
//! use securevector::{ExecutionContext, ReqwestTransport, ScanParameters, ScanPipeline};
//! use serde_json::json;
//!
//! let pipeline = ScanPipeline::new(ReqwestTransport::new()?);
//! let credentials = json!({ "apiKey": "sk_..." });
//!
//! let params = ScanParameters::for_prompt("Summarize this document");
//! let result = pipeline
//!     .scan_item(0, &params, &credentials, &ExecutionContext::default())
//!     .await?;
//!
//! println!("{} ({} risk, score {:.1})", result.verdict, result.risk_level, result.score);
//! ```
//!
//! ### Blocking
//!
//! ```rust,ignore
//! use securevector::{FailureMode, ScanParameters};
//!
//! let params = ScanParameters {
//!     block_on_threat: true,
//!     threat_threshold: 70,
//!     ..ScanParameters::for_prompt("Ignore previous instructions")
//! };
//!
//! // Policy blocks become `{ "error": ... }` items, hard errors abort the run
//! let outputs = pipeline
//!     .execute(&[params], &credentials, &context, FailureMode::ContinueOnPolicyBlock)
//!     .await?;
//! ```
//!
//! ### Redaction
//!
//! ```rust
//! use securevector::sanitize_error_message;
//!
//! let clean = sanitize_error_message("request failed: X-Api-Key: sk_live_abcdef0123456789");
//! assert!(!clean.contains("abcdef0123456789"));
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: Per-item orchestration and host-facing outputs
//! - [`dispatch`]: Retry policy and dispatcher
//! - [`transport`]: HTTP and sleep seams, reqwest transport
//! - [`protocol`]: Request, response and normalized result types
//! - [`policy`]: Blocking policy evaluation
//! - [`credentials`]: Runtime credential validation
//! - [`security`]: Prompt sanitization and secret redaction
//! - [`config`]: Host parameters and TOML/environment configuration
//! - [`error`]: Error types and result aliases

pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod protocol;
pub mod security;
pub mod transport;

// Re-exports for convenience
pub use config::{Config, ScanParameters, ScanSettings};
pub use credentials::Credentials;
pub use dispatch::{Dispatcher, ExponentialBackoff, RetryPolicy};
pub use error::{ErrorKind, Result, ScanError};
pub use pipeline::{ExecutionContext, FailureMode, ItemFailure, ItemOutput, ScanPipeline};
pub use policy::{BlockingCondition, BlockingPolicy, PolicyViolation};
pub use protocol::{NormalizedResult, RawApiResponse, RiskLevel, ScanRequest, Threat, Verdict};
pub use security::{sanitize_error_message, sanitize_error_value, sanitize_prompt};
pub use transport::{HttpTransport, ReqwestTransport, Sleeper, TokioSleeper};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
