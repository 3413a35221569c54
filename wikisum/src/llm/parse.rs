//! Defensive decoding of model replies that were asked for a one-key JSON object.

use serde_json::{Map, Value};

use crate::text::collapse_whitespace;

/// How much of the requested structure survived.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// The reply (minus code fences) was a JSON object.
    Structured(Map<String, Value>),
    /// A JSON object was found embedded in surrounding prose.
    Recovered(Map<String, Value>),
    /// No usable object; the whole reply, whitespace-normalized.
    Raw(String),
}

impl ParsedOutput {
    pub fn parse(raw: &str) -> Self {
        let cleaned = strip_code_fences(raw);
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(cleaned) {
            return ParsedOutput::Structured(map);
        }
        if let Some(candidate) = extract_json_from_text(raw) {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&candidate) {
                return ParsedOutput::Recovered(map);
            }
        }
        ParsedOutput::Raw(collapse_whitespace(raw))
    }

    pub fn is_structured(&self) -> bool {
        !matches!(self, ParsedOutput::Raw(_))
    }

    /// Non-empty string value of `field`, falling back to the raw text when the field is
    /// missing or the reply had no structure at all.
    pub fn text_field(&self, field: &str, raw: &str) -> String {
        let map = match self {
            ParsedOutput::Structured(map) | ParsedOutput::Recovered(map) => map,
            ParsedOutput::Raw(text) => return text.clone(),
        };
        match map.get(field) {
            Some(Value::String(value)) if !value.trim().is_empty() => collapse_whitespace(value),
            _ => collapse_whitespace(raw),
        }
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    rest.trim().trim_end_matches("```").trim()
}

/// Helper to extract JSON from text that might contain markdown backticks or preamble
pub fn extract_json_from_text(text: &str) -> Option<String> {
    // 1. Content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 2. Content between ``` and ```
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 3. First '{' to last '}'
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }

    None
}
