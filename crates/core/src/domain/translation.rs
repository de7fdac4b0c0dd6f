// Translation request/result value types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::error::{DomainError, Result};

/// Upper bound on source text, counted in characters (not bytes)
pub const MAX_TEXT_CHARS: usize = 1000;

/// A translation request as received from a caller.
///
/// Construction never fails; [`TranslationRequest::validate`] is called at the
/// gateway boundary so that invalid input is rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    text: String,
    source_lang: String,
    target_lang: String,
}

impl TranslationRequest {
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    /// Check length and presence rules.
    ///
    /// Length is measured on the raw text so that padding cannot be used to
    /// smuggle an oversized payload past the bound.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(DomainError::EmptyText);
        }
        let len = self.text.chars().count();
        if len > MAX_TEXT_CHARS {
            return Err(DomainError::TextTooLong {
                len,
                max: MAX_TEXT_CHARS,
            });
        }
        if self.source_lang.trim().is_empty() {
            return Err(DomainError::MissingLanguage("Source"));
        }
        if self.target_lang.trim().is_empty() {
            return Err(DomainError::MissingLanguage("Target"));
        }
        Ok(())
    }

    /// Normalized fields used for content addressing:
    /// (trimmed text, lower-cased source, lower-cased target)
    pub fn normalized(&self) -> (String, String, String) {
        (
            self.text.trim().to_string(),
            self.source_lang.trim().to_lowercase(),
            self.target_lang.trim().to_lowercase(),
        )
    }
}

/// Result of a successful translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translated_text: String,
    /// Source language as confirmed (or detected) by the engine
    pub detected_lang: Option<String>,
    /// Round-trip time of the engine call that produced this result
    pub latency: Duration,
}
