//! Host-facing item outputs and failures.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ErrorKind, ScanError};
use crate::security::sanitize_error_message;

const EMPTY_INPUT_DESCRIPTION: &str =
    "Provide a non-empty prompt, for example by mapping a text field from the previous step.";
const INVALID_DATA_DESCRIPTION: &str =
    "The request or response data format is invalid. Please check your input.";
const INVALID_CREDENTIALS_DESCRIPTION: &str =
    "Check the API key and base URL stored in the SecureVector credentials.";
const TIMEOUT_DESCRIPTION: &str =
    "The scan did not complete in time. Consider increasing the timeout value or try again later.";

/// Successful (or continued) output for one input item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutput {
    /// Index of the originating input item
    pub item_index: usize,
    /// Output payload
    pub json: Value,
}

/// Failure reported to the host for one input item.
///
/// Only constructible through [`ItemFailure::from_error`], so message and
/// description are always redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("item {item_index}: {message}")]
pub struct ItemFailure {
    item_index: usize,
    kind: ErrorKind,
    message: String,
    description: Option<String>,
}

impl ItemFailure {
    /// Build a redacted failure from a pipeline error.
    pub fn from_error(item_index: usize, err: &ScanError) -> Self {
        let (message, description) = match err {
            ScanError::EmptyInput => (err.to_string(), Some(EMPTY_INPUT_DESCRIPTION.to_string())),
            ScanError::InvalidRequest(reason) | ScanError::InvalidResponse(reason) => (
                format!("Invalid data: {reason}"),
                Some(INVALID_DATA_DESCRIPTION.to_string()),
            ),
            ScanError::Json(e) => (
                format!("Invalid data: {e}"),
                Some(INVALID_DATA_DESCRIPTION.to_string()),
            ),
            ScanError::InvalidCredentials(_) => (
                err.to_string(),
                Some(INVALID_CREDENTIALS_DESCRIPTION.to_string()),
            ),
            ScanError::TransportTimeout { .. } => (
                "Scan request timed out".to_string(),
                Some(TIMEOUT_DESCRIPTION.to_string()),
            ),
            ScanError::Transport { status, .. } => (
                err.to_string(),
                status.map(|code| format!("The scanning API responded with HTTP status {code}.")),
            ),
            ScanError::PolicyBlock(violation) => {
                (violation.message(), Some(violation.description()))
            }
            ScanError::Config(_) => (err.to_string(), None),
        };

        Self {
            item_index,
            kind: err.kind(),
            message: sanitize_error_message(&message),
            description: description.map(|d| sanitize_error_message(&d)),
        }
    }

    /// Index of the failing item.
    pub fn item_index(&self) -> usize {
        self.item_index
    }

    /// Error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Redacted message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Redacted description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether the failure is a policy block.
    pub fn is_policy_block(&self) -> bool {
        self.kind == ErrorKind::PolicyBlock
    }

    /// Output item used when the host continues past a failure.
    pub fn to_output(&self) -> ItemOutput {
        ItemOutput {
            item_index: self.item_index,
            json: json!({ "error": self.message }),
        }
    }
}
