//! Error envelope returned by the scanning API on non-2xx responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{ "error": {...}, "timestamp": "...", "requestId": "..." }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Error detail
    pub error: ApiErrorDetail,
    /// ISO 8601 timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Server-side request identifier
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Inner error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Machine-readable code (e.g. `RATE_LIMITED`)
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Extra fields
    #[serde(default)]
    pub details: Option<Map<String, Value>>,
}

impl ApiErrorBody {
    /// Parse an error body, if it has the expected shape.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// One-line description for error messages.
    pub fn summary(&self) -> String {
        match &self.request_id {
            Some(id) => format!("{}: {} (request {id})", self.error.code, self.error.message),
            None => format!("{}: {}", self.error.code, self.error.message),
        }
    }
}
