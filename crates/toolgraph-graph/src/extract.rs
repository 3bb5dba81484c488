//! Turning an extractor mapping plus the raw input into typed parameters
//! and intent flags.
//!
//! Extractor values always win. The fallback rules below only fill fields
//! the extractor left absent or unusable, and always take the first match.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use toolgraph_core::traits::Extraction;

use crate::state::{ExtractedParams, IntentFlags};

const DATETIME_PHRASES: &[&str] = &[
    "what time",
    "current time",
    "time is it",
    "time now",
    "current date",
    "today's date",
    "what day is it",
];

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"'([^']*)'|"([^"]*)""#).unwrap())
}

fn reverse_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\breverse\b").unwrap())
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap())
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s<>]+").unwrap())
}

fn console_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bconsole\s+logs?\b").unwrap())
}

fn network_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bnetwork\s+(requests?|activity|logs?)\b").unwrap())
}

/// Resolve every parameter: extractor value first, fallback second.
pub fn resolve_params(extraction: &Extraction, text: &str) -> ExtractedParams {
    let text_to_reverse =
        string_field(extraction, "text_to_reverse").or_else(|| fallback_quoted(text));
    let target_date = date_field(extraction, "target_date").or_else(|| fallback_date(text));
    let page_url = string_field(extraction, "page_url").or_else(|| fallback_url(text));
    let element_selector = string_field(extraction, "element_selector");
    let extraction_target = target_field(extraction);

    ExtractedParams {
        text_to_reverse,
        target_date,
        page_url,
        element_selector,
        extraction_target,
    }
}

/// Derive flags from the final parameters. A flag never holds without its
/// prerequisite parameter.
pub fn derive_flags(params: &ExtractedParams, extraction: &Extraction, text: &str) -> IntentFlags {
    let lowered = text.to_lowercase();
    let has_page = params.page_url.is_some();

    let wants_datetime = bool_field(extraction, "wants_datetime")
        .unwrap_or_else(|| DATETIME_PHRASES.iter().any(|p| lowered.contains(p)));
    let wants_console_logs = has_page
        && bool_field(extraction, "wants_console_logs").unwrap_or_else(|| console_re().is_match(text));
    let wants_network_logs = has_page
        && bool_field(extraction, "wants_network_logs").unwrap_or_else(|| network_re().is_match(text));

    IntentFlags {
        wants_reversal: params.text_to_reverse.is_some(),
        wants_countdown: params.target_date.is_some(),
        wants_datetime,
        wants_browser_open: has_page,
        wants_click_action: has_page && params.element_selector.is_some(),
        wants_console_logs,
        wants_network_logs,
    }
}

fn string_field(extraction: &Extraction, key: &str) -> Option<String> {
    match extraction.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Null => None,
        other => {
            debug!(field = key, value = %other, "Ignoring non-string extractor value");
            None
        }
    }
}

fn date_field(extraction: &Extraction, key: &str) -> Option<NaiveDate> {
    let raw = string_field(extraction, key)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(field = key, value = %raw, "Ignoring unparsable extractor date");
            None
        }
    }
}

fn bool_field(extraction: &Extraction, key: &str) -> Option<bool> {
    match extraction.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn target_field(extraction: &Extraction) -> Option<String> {
    let joined = match extraction.get("extraction_target")? {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    let target = joined.trim().to_lowercase();
    (!target.is_empty()).then_some(target)
}

/// First quoted substring, only when the input asks for a reversal.
pub fn fallback_quoted(text: &str) -> Option<String> {
    if !reverse_word_re().is_match(text) {
        return None;
    }
    let caps = quoted_re().captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// First `YYYY-MM-DD` token that is a real calendar date.
pub fn fallback_date(text: &str) -> Option<NaiveDate> {
    date_re()
        .captures_iter(text)
        .find_map(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
}

/// First http(s) URL, with trailing sentence punctuation removed.
pub fn fallback_url(text: &str) -> Option<String> {
    let m = url_re().find(text)?;
    let url = m
        .as_str()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | '\'' | '"'));
    (!url.is_empty()).then(|| url.to_string())
}
