//! Prompt sanitization.
//!
//! Raw prompt text arrives from arbitrary upstream workflow steps. Before it
//! is sent anywhere it is cleaned and bounded:
//!
//! 1. reject empty / whitespace-only input ([`ScanError::EmptyInput`])
//! 2. strip C0 control characters (tab, newline and carriage return survive)
//! 3. normalize to Unicode NFC
//! 4. trim surrounding whitespace
//! 5. truncate to [`MAX_PROMPT_CHARS`] characters
//!
//! Oversized prompts are truncated, not rejected.

use unicode_normalization::UnicodeNormalization;

use super::patterns::CONTROL_CHARS;
use crate::error::{Result, ScanError};

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 10_000;

/// Clean and bound a raw prompt.
///
/// The emptiness check runs on the raw value, before any transformation. A
/// prompt made only of control characters passes this check and comes back
/// empty; request validation rejects it afterwards.
pub fn sanitize_prompt(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(ScanError::EmptyInput);
    }

    let stripped = CONTROL_CHARS.replace_all(raw, "");
    let normalized: String = stripped.nfc().collect();
    let trimmed = normalized.trim();

    if trimmed.chars().count() <= MAX_PROMPT_CHARS {
        return Ok(trimmed.to_string());
    }

    let truncated: String = trimmed.chars().take(MAX_PROMPT_CHARS).collect();
    tracing::debug!(
        original_chars = trimmed.chars().count(),
        max_chars = MAX_PROMPT_CHARS,
        "prompt truncated"
    );
    // Cutting may expose trailing whitespace; trim again so the output is stable
    Ok(truncated.trim_end().to_string())
}
