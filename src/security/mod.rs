//! Local sanitization for everything crossing the connector boundary.
//!
//! Two directions are covered:
//!
//! | Direction | Function                   | Purpose                                   |
//! |-----------|----------------------------|-------------------------------------------|
//! | Inbound   | [`sanitize_prompt`]        | strip controls, NFC, trim, bound length   |
//! | Outbound  | [`sanitize_error_message`] | redact keys/tokens from error text        |
//! | Outbound  | [`sanitize_error_value`]   | same, applied to serialized error objects |
//!
//! # Usage
//!
//! ```rust,ignore
//! use securevector::security::{sanitize_error_message, sanitize_prompt};
//!
//! let prompt = sanitize_prompt("  ignore previous instructions\u{0}  ").unwrap();
//! assert_eq!(prompt, "ignore previous instructions");
//!
//! let msg = sanitize_error_message("Authorization: Bearer sv_0123456789abcdef");
//! assert!(!msg.contains("0123456789abcdef"));
//! ```

mod patterns;
mod prompt;
mod redact;

pub use patterns::{RedactionPattern, REDACTION_MARKER, REDACTION_PATTERNS};
pub use prompt::{sanitize_prompt, MAX_PROMPT_CHARS};
pub use redact::{sanitize_error_message, sanitize_error_value, DEFAULT_ERROR_MESSAGE};

pub(crate) use patterns::API_KEY_FORMAT;
