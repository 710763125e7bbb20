//! Compiled regex tables used by the prompt and error sanitizers.
//!
//! Patterns are compiled once on first use and shared across invocations;
//! they are immutable, so sharing them does not couple one scan to another.

use lazy_static::lazy_static;
use regex::Regex;

/// Marker substituted for every redacted secret.
pub const REDACTION_MARKER: &str = "***REDACTED***";

/// A secret redaction rule
#[derive(Debug, Clone)]
pub struct RedactionPattern {
    /// Rule name
    pub name: &'static str,
    /// Regex pattern
    pub pattern: &'static str,
    /// Replacement text (may reference capture groups)
    pub replacement: &'static str,
}

/// Redaction rules, applied in order.
///
/// Order matters: bare keys are scrubbed before the header rules run, so a
/// header whose value is itself a key still ends up fully redacted.
///
/// Key tokens have no left boundary, so keys glued to other text
/// (`token_sv_...`, URL-encoded `%3Dsv_...`) are caught too.
pub static REDACTION_PATTERNS: &[RedactionPattern] = &[
    RedactionPattern {
        name: "api_key_token",
        pattern: r"(sk|sv)[_-][A-Za-z0-9_-]{8,}",
        replacement: "${1}_***REDACTED***",
    },
    RedactionPattern {
        name: "api_key_pair",
        pattern: r"(?i)api[_-]?key[:\s=]+[^\s]+",
        replacement: "apiKey: ***REDACTED***",
    },
    RedactionPattern {
        name: "authorization_header",
        pattern: r"(?i)authorization[:\s=]+(?:(?:bearer|basic)\s+)?[^\s]+",
        replacement: "Authorization: ***REDACTED***",
    },
    RedactionPattern {
        name: "x_api_key_header",
        pattern: r"(?i)x-api-key[:\s=]+[^\s]+",
        replacement: "X-Api-Key: ***REDACTED***",
    },
    RedactionPattern {
        name: "bearer_token",
        pattern: r"(?i)bearer\s+[^\s]+",
        replacement: "Bearer ***REDACTED***",
    },
];

lazy_static! {
    /// Compiled redaction rules, same order as [`REDACTION_PATTERNS`]
    pub static ref COMPILED_REDACTIONS: Vec<(Regex, &'static str)> = REDACTION_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p.pattern).ok().map(|re| (re, p.replacement)))
        .collect();

    /// C0 control characters except tab, newline and carriage return, plus DEL
    pub static ref CONTROL_CHARS: Regex =
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("static control-char regex");

    /// Accepted API key shape: `sk`/`sv` prefix, `_` or `-`, then key body
    pub static ref API_KEY_FORMAT: Regex =
        Regex::new(r"^(sk|sv)[_-][A-Za-z0-9_-]+$").expect("static api key regex");
}
