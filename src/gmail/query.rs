//! Translation of structured search options into Gmail search syntax

use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::{Result, ValidationError};

/// Result count used when the caller gives none
pub const DEFAULT_MAX_RESULTS: u32 = 10;

/// Largest page Gmail returns from `messages.list`
pub const MAX_RESULTS_LIMIT: u32 = 500;

/// Clamp a requested result count into the range Gmail accepts
pub fn clamp_max_results(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_MAX_RESULTS)
        .clamp(1, MAX_RESULTS_LIMIT)
}

/// Structured message search
///
/// Populated fields are AND-combined; `false` flags and blank strings are
/// treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
pub struct SearchFilter {
    /// Sender address or name
    #[serde(default)]
    pub from_email: Option<String>,

    /// Text that must appear in the subject
    #[serde(default)]
    pub subject_contains: Option<String>,

    /// Only messages with attachments
    #[serde(default)]
    pub has_attachment: Option<bool>,

    /// Only unread messages
    #[serde(default)]
    pub is_unread: Option<bool>,

    /// Maximum age, e.g. `2d`, `3m`, `1y` (a bare number means days)
    #[serde(default)]
    pub newer_than: Option<String>,

    /// Maximum number of messages to return (1-500, default 10)
    #[serde(default)]
    pub max_results: Option<u32>,
}

impl SearchFilter {
    /// Build the Gmail `q` parameter
    pub fn to_query(&self) -> Result<String> {
        let mut terms = Vec::new();

        if let Some(from) = non_blank(&self.from_email) {
            terms.push(format!("from:{}", quote_term(from)));
        }
        if let Some(subject) = non_blank(&self.subject_contains) {
            terms.push(format!("subject:{}", quote_term(subject)));
        }
        if self.has_attachment == Some(true) {
            terms.push("has:attachment".to_string());
        }
        if self.is_unread == Some(true) {
            terms.push("is:unread".to_string());
        }
        if let Some(age) = non_blank(&self.newer_than) {
            terms.push(format!("newer_than:{}", normalize_age(age)?));
        }

        Ok(terms.join(" "))
    }

    pub fn max_results(&self) -> u32 {
        clamp_max_results(self.max_results)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Quote a term containing whitespace or `:` so it stays a single operator argument
fn quote_term(value: &str) -> String {
    let cleaned = value.replace('"', "");
    if cleaned.chars().any(|c| c.is_whitespace() || c == ':') {
        format!("\"{}\"", cleaned)
    } else {
        cleaned
    }
}

fn normalize_age(age: &str) -> Result<String> {
    static AGE: OnceLock<Regex> = OnceLock::new();
    let pattern = AGE.get_or_init(|| Regex::new(r"^(\d+)([dmy]?)$").expect("valid age pattern"));

    let lowered = age.to_ascii_lowercase();
    let captures = pattern.captures(&lowered).ok_or_else(|| {
        ValidationError::InvalidParameter {
            name: "newer_than".to_string(),
            message: format!("expected a number followed by d, m or y, got '{}'", age),
        }
    })?;

    let unit = match &captures[2] {
        "" => "d",
        unit => unit,
    };
    Ok(format!("{}{}", &captures[1], unit))
}
