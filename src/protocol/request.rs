//! Outbound scan request.
//!
//! Wire shape sent to `POST {baseUrl}/analyze`:
//!
//! ```text
//! {
//!   "prompt":   "<1..=10000 chars>",
//!   "timeout":  30,
//!   "metadata": { "workflowId": "...", "executionId": "...", "source": "..." }
//! }
//! ```
//!
//! `metadata` and each of its fields are optional. Unknown or wrongly-typed
//! metadata fields are dropped rather than rejected, but `metadata` itself
//! must be an object when present.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{Result, ScanError};
use crate::security::MAX_PROMPT_CHARS;

/// Smallest accepted timeout, in seconds.
pub const MIN_TIMEOUT_SECS: u32 = 1;

/// Largest accepted timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u32 = 300;

/// Timeout applied when none is given, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u32 = 30;

/// Optional context attached to a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    /// Calling workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// Calling execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    /// Originating system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ScanMetadata {
    /// Read metadata permissively from a JSON object.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ScanError::InvalidRequest("Metadata must be an object".to_string()))?;

        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            workflow_id: text("workflowId"),
            execution_id: text("executionId"),
            source: text("source"),
        })
    }
}

/// Validated request body for the analyze endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    prompt: String,
    timeout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ScanMetadata>,
}

impl ScanRequest {
    /// Build and validate a request.
    pub fn build(
        prompt: impl Into<String>,
        timeout_secs: u32,
        metadata: Option<ScanMetadata>,
    ) -> Result<Self> {
        let prompt = prompt.into();
        validate_prompt(&prompt)?;
        validate_timeout(i64::from(timeout_secs))?;

        Ok(Self {
            prompt,
            timeout: timeout_secs,
            metadata,
        })
    }

    /// Validate a request given as loosely-typed JSON.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("Scan request must be an object"))?;

        let prompt = obj
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("Prompt must be a string"))?;

        let timeout = match obj.get("timeout") {
            None | Some(Value::Null) => DEFAULT_TIMEOUT_SECS,
            Some(Value::Number(n)) => parse_timeout(n)?,
            Some(_) => return Err(invalid("Timeout must be an integer")),
        };

        let metadata = match obj.get("metadata") {
            None => None,
            Some(meta) => Some(ScanMetadata::from_value(meta)?),
        };

        Self::build(prompt, timeout, metadata)
    }

    /// Prompt text.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Timeout in seconds.
    pub fn timeout_secs(&self) -> u32 {
        self.timeout
    }

    /// Timeout as a request deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout) * 1000)
    }

    /// Attached metadata, if any.
    pub fn metadata(&self) -> Option<&ScanMetadata> {
        self.metadata.as_ref()
    }

    /// JSON body for the wire.
    pub fn to_body(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Parse a JSON number as a timeout in seconds.
///
/// Integral floats such as `30.0` are accepted; fractional values are not.
pub fn parse_timeout(n: &Number) -> Result<u32> {
    let secs = if let Some(i) = n.as_i64() {
        i
    } else {
        match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => return Err(invalid("Timeout must be an integer")),
        }
    };

    validate_timeout(secs)?;
    Ok(secs as u32)
}

fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.is_empty() {
        return Err(invalid("Prompt cannot be empty"));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(invalid(
            "Prompt exceeds maximum length of 10,000 characters",
        ));
    }
    Ok(())
}

fn validate_timeout(secs: i64) -> Result<()> {
    if secs < i64::from(MIN_TIMEOUT_SECS) || secs > i64::from(MAX_TIMEOUT_SECS) {
        return Err(invalid("Timeout must be between 1 and 300 seconds"));
    }
    Ok(())
}

fn invalid(reason: &str) -> ScanError {
    ScanError::InvalidRequest(reason.to_string())
}
