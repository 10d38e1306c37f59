//! Field extraction from raw transcript records.
//!
//! Both providers write loosely-typed JSON; these helpers pull the few
//! fields the index models out of a `serde_json` object without assuming a
//! fixed schema.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Part types whose text is treated as conversation content.
const TEXT_PART_TYPES: &[&str] = &["text", "input_text", "output_text"];

/// Separator between concatenated content parts.
const PART_SEPARATOR: &str = "\n\n";

/// Keys checked, in order, for a directly recorded working directory.
const CWD_KEYS: &[&str] = &["cwd", "working_dir", "current_working_directory"];

/// String form of a scalar JSON value; empty for anything else.
pub fn string_or(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Non-blank string value of a key.
pub fn non_blank<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn is_text_part(kind: &str) -> bool {
    TEXT_PART_TYPES.contains(&kind)
}

/// Human-readable text of a record.
///
/// Looks at a nested `message` object, then a nested `payload` object, then a
/// flat `content` field, then `text`, then `message` as a plain string. The
/// first non-blank result wins.
pub fn extract_text(raw: &Map<String, Value>) -> String {
    let nested = message_like_text(raw.get("message"));
    if !nested.is_empty() {
        return nested;
    }
    let nested = message_like_text(raw.get("payload"));
    if !nested.is_empty() {
        return nested;
    }
    let content = content_text(raw.get("content"), false);
    if !content.is_empty() {
        return content;
    }
    for key in ["text", "message"] {
        let value = string_or(raw.get(key));
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    String::new()
}

fn message_like_text(value: Option<&Value>) -> String {
    let Some(Value::Object(object)) = value else {
        return String::new();
    };
    let content = content_text(object.get("content"), true);
    if !content.is_empty() {
        return content;
    }
    for key in ["text", "message"] {
        let value = string_or(object.get(key));
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    String::new()
}

/// Text of a `content` value: a plain string, or an array of typed parts.
///
/// Text-bearing parts contribute their `text` (else `content`). Thinking
/// parts and parts of unknown type only contribute when `include_thinking`
/// is set.
pub fn content_text(value: Option<&Value>, include_thinking: bool) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Array(items)) => {
            let mut parts: Vec<String> = Vec::new();
            for item in items {
                let part = match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(object) => {
                        let kind = string_or(object.get("type")).to_lowercase();
                        if is_text_part(&kind) {
                            non_blank(object, "text")
                                .or_else(|| non_blank(object, "content"))
                                .map(str::to_string)
                        } else if !include_thinking {
                            None
                        } else if kind == "thinking" {
                            non_blank(object, "thinking").map(str::to_string)
                        } else {
                            non_blank(object, "text").map(str::to_string)
                        }
                    }
                    _ => None,
                };
                if let Some(part) = part.filter(|p| !p.trim().is_empty()) {
                    parts.push(part);
                }
            }
            parts.join(PART_SEPARATOR)
        }
        _ => String::new(),
    }
}

/// Split a Claude `message` object into `(text, thinking)`.
///
/// A string `content` is all text. An array contributes its text parts to
/// the first element and its thinking parts to the second; `tool_use` and
/// `tool_result` parts contribute to neither.
pub fn claude_segments(message: &Map<String, Value>) -> (String, String) {
    match message.get("content") {
        Some(Value::String(s)) if !s.trim().is_empty() => (s.clone(), String::new()),
        Some(Value::Array(items)) => {
            let mut text = Vec::new();
            let mut thinking = Vec::new();
            for object in items.iter().filter_map(Value::as_object) {
                let kind = string_or(object.get("type")).to_lowercase();
                if is_text_part(&kind) {
                    text.extend(non_blank(object, "text"));
                    text.extend(non_blank(object, "content"));
                } else if kind == "thinking" {
                    thinking.extend(non_blank(object, "thinking"));
                }
            }
            (text.join(PART_SEPARATOR), thinking.join(PART_SEPARATOR))
        }
        _ => (String::new(), String::new()),
    }
}

/// Working directory revealed by a record, if any.
///
/// Checked in order: direct string fields, the nested `git` object, an
/// `environment_context` blob, then `<cwd>` markup inside `content`.
pub fn extract_cwd(raw: &Map<String, Value>) -> Option<String> {
    for key in CWD_KEYS {
        if let Some(cwd) = non_blank(raw, key) {
            return Some(cwd.trim().to_string());
        }
    }

    if let Some(Value::Object(git)) = raw.get("git") {
        for key in ["cwd", "root"] {
            if let Some(cwd) = non_blank(git, key) {
                return Some(cwd.trim().to_string());
            }
        }
    }

    if let Some(context) = non_blank(raw, "environment_context") {
        let context = context.trim();
        if let Some(cwd) = between(context, "<cwd>", "</cwd>") {
            return Some(cwd.to_string());
        }
        // Unterminated tag: take everything up to the next tag
        if let Some(start) = context.to_lowercase().find("<cwd>") {
            let rest = context.get(start + "<cwd>".len()..).unwrap_or_default();
            if let Some(end) = rest.find('<').filter(|&end| end > 0) {
                let cwd = rest[..end].trim();
                if !cwd.is_empty() {
                    return Some(cwd.to_string());
                }
            }
        }
    }

    match raw.get("content") {
        Some(Value::String(s)) => cwd_in_text(s),
        Some(Value::Array(items)) => items.iter().find_map(|item| match item {
            Value::String(s) => cwd_in_text(s),
            Value::Object(object) => {
                let kind = object.get("type").and_then(Value::as_str).unwrap_or("");
                if !is_text_part(kind) {
                    return None;
                }
                non_blank(object, "text")
                    .and_then(cwd_in_text)
                    .or_else(|| non_blank(object, "content").and_then(cwd_in_text))
            }
            _ => None,
        }),
        _ => None,
    }
}

fn cwd_in_text(text: &str) -> Option<String> {
    between(text, "<cwd>", "</cwd>").map(str::to_string)
}

/// Trimmed text between the first `open` and the following `close`.
///
/// Returns `None` when either marker is missing or the enclosed text is
/// blank.
pub fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    let end = rest.find(close)?;
    let inner = rest[..end].trim();
    (!inner.is_empty()).then_some(inner)
}

/// First value that parses as a timestamp.
///
/// Strings may be RFC 3339 (any fractional precision) or all-digit unix
/// seconds. Numbers are unix seconds and must exceed 1e9 to count.
pub fn parse_time(values: &[Option<&Value>]) -> Option<DateTime<Utc>> {
    values.iter().flatten().find_map(|value| match value {
        Value::String(s) => parse_time_str(s),
        Value::Number(n) => n
            .as_f64()
            .filter(|secs| *secs > 1_000_000_000.0)
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
        _ => None,
    })
}

fn parse_time_str(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = text.parse().ok()?;
        return DateTime::from_timestamp(secs, 0);
    }
    None
}

/// Whether a record is an `event_msg` echo of a user or agent turn.
///
/// Codex writes each turn twice: once as a structured `response_item` and
/// once as a lightweight `event_msg`. Only the structured form is kept.
pub fn is_event_echo(raw: &Map<String, Value>) -> bool {
    if string_or(raw.get("type")).to_lowercase() != "event_msg" {
        return false;
    }
    let Some(Value::Object(payload)) = raw.get("payload") else {
        return false;
    };
    matches!(
        string_or(payload.get("type")).to_lowercase().as_str(),
        "user_message" | "agent_message"
    )
}
