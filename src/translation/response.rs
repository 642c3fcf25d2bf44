/*!
 * Recovery of a JSON array of strings from free-form model output.
 *
 * Models wrap their answer in prose or code fences, or leave trailing
 * commas behind. Strategies are tried in order and the first one that
 * yields an array wins:
 *
 * 1. the whole trimmed reply
 * 2. the content of the first fenced code block
 * 3. the span from the first `[` to the last `]`
 * 4. that span after repairing trailing and doubled commas
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::ProviderError;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").unwrap()
});

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([\]}])").unwrap());

static DOUBLED_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\[,])\s*,").unwrap());

/// Extract a list of strings from a model reply
///
/// Non-string elements are coerced: `null` becomes an empty string,
/// numbers and booleans their JSON literal, objects and arrays their
/// compact JSON text.
pub fn parse_json_array(text: &str) -> Result<Vec<String>, ProviderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::EmptyResponse("reply contained no text".to_string()));
    }

    if let Some(items) = try_array(trimmed) {
        return Ok(items);
    }

    if let Some(block) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        if let Some(items) = try_array(block.as_str().trim()) {
            return Ok(items);
        }
    }

    if let Some(span) = bracket_span(trimmed) {
        if let Some(items) = try_array(span) {
            return Ok(items);
        }
        if let Some(items) = try_array(&repair_commas(span)) {
            return Ok(items);
        }
    }

    Err(ProviderError::Parse(format!(
        "no JSON array found in reply: {}",
        preview(trimmed)
    )))
}

/// Parse `candidate` and accept it only if it is an array
fn try_array(candidate: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Array(values) => Some(values.into_iter().map(coerce).collect()),
        _ => None,
    }
}

fn coerce(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Text from the first `[` to the last `]`, inclusive
fn bracket_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Remove commas before a closing bracket and empty slots after an opening bracket or comma
fn repair_commas(span: &str) -> String {
    let mut current = span.to_string();
    loop {
        let next = TRAILING_COMMA.replace_all(&current, "$1");
        let next = DOUBLED_COMMA.replace_all(&next, "$1").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}
