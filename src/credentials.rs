//! Runtime validation of stored API credentials.
//!
//! Stored secrets are user-editable independently of the connector, so they
//! are validated every time they are used instead of trusting a save-time
//! check. The validator accepts the raw JSON object the host stores and
//! yields a typed [`Credentials`] value.
//!
//! # Rules
//!
//! | Field     | Rule                                                         |
//! |-----------|--------------------------------------------------------------|
//! | `apiKey`  | string, at least 32 chars, `^(sk\|sv)[_-][A-Za-z0-9_-]+$`     |
//! | `baseUrl` | optional; parses as URL, scheme `https`, host is `securevector.io` or a subdomain |

use std::fmt;

use reqwest::Url;
use serde_json::{json, Value};

use crate::error::{Result, ScanError};
use crate::security::{API_KEY_FORMAT, REDACTION_MARKER};

/// Minimum API key length in characters.
pub const MIN_API_KEY_LEN: usize = 32;

/// Base URL used when none is stored.
pub const DEFAULT_BASE_URL: &str = "https://scan.securevector.io";

/// Root domain every base URL must belong to.
pub const TRUSTED_DOMAIN: &str = "securevector.io";

/// Validated API credentials.
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    base_url: String,
}

impl Credentials {
    /// Validate a raw credential object as stored by the host.
    pub fn validate(raw: &Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| invalid("Credentials must be an object"))?;

        let api_key = match obj.get("apiKey") {
            None | Some(Value::Null) => return Err(invalid("API key is required")),
            Some(Value::String(key)) => key,
            Some(_) => return Err(invalid("API key must be a string")),
        };
        validate_api_key(api_key)?;

        let base_url = match obj.get("baseUrl") {
            None | Some(Value::Null) => DEFAULT_BASE_URL.to_string(),
            // Hosts store an empty string when the field is left blank
            Some(Value::String(url)) if url.trim().is_empty() => DEFAULT_BASE_URL.to_string(),
            Some(Value::String(url)) => validate_base_url(url)?,
            Some(_) => return Err(invalid("Base URL must be a string")),
        };

        Ok(Self {
            api_key: api_key.clone(),
            base_url,
        })
    }

    /// Validate credentials given as separate parts.
    pub fn from_parts(api_key: &str, base_url: Option<&str>) -> Result<Self> {
        let mut raw = json!({ "apiKey": api_key });
        if let Some(url) = base_url {
            raw["baseUrl"] = Value::String(url.to_string());
        }
        Self::validate(&raw)
    }

    /// API key, for the `X-Api-Key` header only.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the analyze endpoint.
    pub fn analyze_url(&self) -> String {
        format!("{}/analyze", self.base_url)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &REDACTION_MARKER)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn invalid(reason: &str) -> ScanError {
    ScanError::InvalidCredentials(reason.to_string())
}

fn validate_api_key(key: &str) -> Result<()> {
    if key.chars().count() < MIN_API_KEY_LEN {
        return Err(invalid("API key must be at least 32 characters"));
    }
    if !API_KEY_FORMAT.is_match(key) {
        return Err(invalid(
            "Invalid API key format (must start with \"sk_\", \"sk-\", \"sv_\", or \"sv-\")",
        ));
    }
    Ok(())
}

fn validate_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).map_err(|_| invalid("Invalid base URL"))?;

    if url.scheme() != "https" {
        return Err(invalid("Base URL must use HTTPS protocol for security"));
    }

    // Url lowercases domain hosts during parsing
    let trusted = url.host_str().is_some_and(|host| {
        let host = host.to_ascii_lowercase();
        host == TRUSTED_DOMAIN || host.ends_with(&format!(".{TRUSTED_DOMAIN}"))
    });
    if !trusted {
        return Err(invalid(
            "Base URL must be a securevector.io domain (e.g., https://scan.securevector.io)",
        ));
    }

    Ok(raw.trim_end_matches('/').to_string())
}
