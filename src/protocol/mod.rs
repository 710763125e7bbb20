//! Wire types for the SecureVector analyze API.
//!
//! # Exchange
//!
//! ```text
//! Connector                                   Scanning API
//!    |                                              |
//!    |-- POST {baseUrl}/analyze ------------------->|
//!    |   X-Api-Key: <key>                           |
//!    |   { prompt, timeout, metadata? }             |
//!    |                                              |
//!    |<-- 200 RawApiResponse -----------------------|
//!    |    (or 4xx/5xx ApiErrorBody)                 |
//! ```
//!
//! The raw response is validated ([`RawApiResponse::validate`]) and then
//! reshaped into a [`NormalizedResult`] for the host.
//!
//! | Raw field        | Normalized field(s)                |
//! |------------------|------------------------------------|
//! | `verdict`        | `verdict`                          |
//! | `threat_score`   | `threat_score`, `score` (x100)     |
//! | `threat_level`   | `threat_level`, `riskLevel`        |
//! | `matched_rules`  | `threats` (pattern/evidence dropped) |
//! | `recommendation` | `recommendation` (null if absent)  |
//! | `analysis`       | `analysis`                         |

mod error_body;
mod request;
mod response;
mod result;

pub use error_body::{ApiErrorBody, ApiErrorDetail};
pub use request::{
    parse_timeout, ScanMetadata, ScanRequest, DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS,
    MIN_TIMEOUT_SECS,
};
pub use response::{MatchedRule, RawApiResponse, RiskLevel, Verdict};
pub use result::{normalize, NormalizedResult, Threat};
