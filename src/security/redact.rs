//! Secret redaction for error text.
//!
//! Every message that leaves the crate, whether as an error string or as a
//! serialized error object, is passed through [`sanitize_error_message`] or
//! [`sanitize_error_value`] first. The scrubbed shapes are bare API keys,
//! `apiKey:` pairs, `Authorization:` and `X-Api-Key:` headers, and
//! `Bearer` tokens.

use serde_json::Value;

use super::patterns::COMPILED_REDACTIONS;

/// Message used when an error carries no text at all.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// Redact credentials from an error message.
///
/// Empty or whitespace-only input yields [`DEFAULT_ERROR_MESSAGE`].
pub fn sanitize_error_message(text: &str) -> String {
    if text.trim().is_empty() {
        return DEFAULT_ERROR_MESSAGE.to_string();
    }

    let mut result = text.to_string();
    for (regex, replacement) in COMPILED_REDACTIONS.iter() {
        result = regex.replace_all(&result, *replacement).into_owned();
    }
    result
}

/// Redact credentials from every string inside a JSON error object.
///
/// Object keys are left alone; only values are rewritten.
pub fn sanitize_error_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::String(String::new()),
        Value::String(s) => Value::String(sanitize_error_message(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_error_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_error_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
