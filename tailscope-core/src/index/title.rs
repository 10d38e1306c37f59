//! Session title heuristics.
//!
//! Titles come from, in priority order: a persisted custom title, a Claude
//! `summary` record, an explicit `title` field, the first usable message
//! content, then the working directory or session id. Candidates that are
//! machine noise (environment-context blobs, generated rollout ids) are
//! rejected so a later message can supply something readable.

use crate::types::Session;
use regex::Regex;
use std::sync::OnceLock;

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 80;

const ELLIPSIS: char = '…';

const ENVIRONMENT_MARKERS: &[&str] = &[
    "<cwd>",
    "</cwd>",
    "<approval_pol",
    "<sandbox_mode",
    "<network_access",
    "<shell>",
];

fn generated_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]+-\d{4}-\d{2}-\d{2}t\d{2}-\d{2}-\d{2}(?:-[0-9a-z]+)+$")
            .expect("valid generated id regex")
    })
}

/// Collapse newlines and cut to [`MAX_TITLE_CHARS`] characters.
pub fn trim_title(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= MAX_TITLE_CHARS {
        return flat.to_string();
    }
    let mut out: String = flat.chars().take(MAX_TITLE_CHARS).collect();
    out.push(ELLIPSIS);
    out
}

/// Accept a title candidate for `session`, or reject it with `None`.
pub fn normalize_candidate(candidate: &str, session: &Session) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    if session.id.trim().eq_ignore_ascii_case(candidate) {
        return None;
    }
    if looks_like_environment_context(candidate) || looks_like_generated_identifier(candidate) {
        return None;
    }
    Some(trim_title(candidate))
}

/// Whether text is an XML-ish environment metadata blob.
pub fn looks_like_environment_context(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    if lower.contains("<environment_context") {
        return true;
    }
    ENVIRONMENT_MARKERS
        .iter()
        .filter(|marker| lower.contains(*marker))
        .count()
        >= 2
}

/// Whether text looks like a generated session or rollout identifier.
pub fn looks_like_generated_identifier(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }
    lower.starts_with("rollout-") || generated_id_pattern().is_match(&lower)
}

/// Last-resort title: cwd basename, then cwd, then a readable session id.
pub fn fallback_title(session: &Session) -> Option<String> {
    let base = session.cwd_base.trim();
    if !base.is_empty() {
        return Some(base.to_string());
    }
    let cwd = session.cwd.trim();
    if !cwd.is_empty() {
        return Some(cwd.to_string());
    }
    let id = session.id.trim();
    if !id.is_empty() && !looks_like_generated_identifier(id) {
        return Some(id.to_string());
    }
    None
}
