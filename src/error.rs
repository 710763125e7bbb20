//! Connector error types.
//!
//! # Error Classification
//!
//! | Kind                 | Origin                         | Retried |
//! |----------------------|--------------------------------|---------|
//! | `EmptyInput`         | prompt sanitizer               | never   |
//! | `InvalidCredentials` | credential validator           | never   |
//! | `InvalidRequest`     | request builder, parameters    | never   |
//! | `InvalidResponse`    | response validator             | never   |
//! | `TransportTimeout`   | HTTP client deadline           | never   |
//! | `Transport`          | HTTP status / network failure  | 429, 502, 503, 504 only |
//! | `PolicyBlock`        | blocking policy                | never   |
//!
//! `PolicyBlock` is a successful security decision rather than a fault. Hosts
//! can tell it apart with [`ScanError::is_policy_block`] and keep processing
//! other items while still stopping on hard errors.

use thiserror::Error;

use crate::policy::PolicyViolation;
use crate::security::sanitize_error_message;

/// HTTP statuses the dispatcher treats as transient.
pub const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Connector errors.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Prompt was empty or whitespace-only before sanitization.
    #[error("Prompt is required but was empty or undefined")]
    EmptyInput,

    /// Stored credentials failed runtime validation.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Outbound scan request or host parameters failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Remote API answered with a body that does not match the expected schema.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request exceeded the caller-supplied timeout.
    #[error("Scan request timed out after {timeout_secs}s")]
    TransportTimeout {
        /// Timeout that was applied, in seconds.
        timeout_secs: u32,
    },

    /// HTTP or network failure.
    #[error("{}", transport_display(.status, .message))]
    Transport {
        /// HTTP status, when the remote answered at all.
        status: Option<u16>,
        /// Failure detail, already passed through [`sanitize_error_message`].
        message: String,
    },

    /// Content blocked by the configured security policy.
    #[error("{0}")]
    PolicyBlock(Box<PolicyViolation>),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[allow(clippy::ref_option)]
fn transport_display(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Scan API returned HTTP {code}: {message}"),
        None => format!("Scan API request failed: {message}"),
    }
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Discriminant of [`ScanError`], cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ScanError::EmptyInput`].
    EmptyInput,
    /// See [`ScanError::InvalidCredentials`].
    InvalidCredentials,
    /// See [`ScanError::InvalidRequest`].
    InvalidRequest,
    /// See [`ScanError::InvalidResponse`].
    InvalidResponse,
    /// See [`ScanError::TransportTimeout`].
    TransportTimeout,
    /// See [`ScanError::Transport`].
    TransportError,
    /// See [`ScanError::PolicyBlock`].
    PolicyBlock,
    /// See [`ScanError::Config`].
    Config,
}

impl ScanError {
    /// Build a transport error with an HTTP status.
    ///
    /// The message is redacted here, since servers and the network layer
    /// may echo request headers back.
    pub fn http(status: u16, message: impl AsRef<str>) -> Self {
        Self::Transport {
            status: Some(status),
            message: sanitize_error_message(message.as_ref()),
        }
    }

    /// Build a transport error without a status (connection refused, DNS, TLS...).
    pub fn network(message: impl AsRef<str>) -> Self {
        Self::Transport {
            status: None,
            message: sanitize_error_message(message.as_ref()),
        }
    }

    /// Error discriminant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            // Malformed JSON coming back from the API is a response problem
            Self::InvalidResponse(_) | Self::Json(_) => ErrorKind::InvalidResponse,
            Self::TransportTimeout { .. } => ErrorKind::TransportTimeout,
            Self::Transport { .. } => ErrorKind::TransportError,
            Self::PolicyBlock(_) => ErrorKind::PolicyBlock,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the dispatcher may retry after this error.
    pub fn is_retryable(&self) -> bool {
        self.status()
            .is_some_and(|code| RETRYABLE_STATUSES.contains(&code))
    }

    /// Whether this is a deliberate policy stop rather than a failure.
    pub fn is_policy_block(&self) -> bool {
        matches!(self, Self::PolicyBlock(_))
    }
}

impl From<PolicyViolation> for ScanError {
    fn from(violation: PolicyViolation) -> Self {
        ScanError::PolicyBlock(Box::new(violation))
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ScanError::http(status.as_u16(), err.to_string()),
            None => ScanError::network(err.to_string()),
        }
    }
}
