//! Core domain types for tailscope
//!
//! These types are the normalized model every provider's transcript lines are
//! folded into.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Provider** | The assistant tool whose JSONL schema a line was written in (Codex, Claude) |
//! | **Message** | One normalized line from a transcript file |
//! | **Session** | Aggregate of all messages sharing one conversation key |
//! | **Source** | Path of a transcript file relative to its provider root |
//! | **Cursor** | Byte offset + line number reached in a transcript file |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

// ============================================
// Provider
// ============================================

/// Assistant tools whose transcripts are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Codex,
    Claude,
}

impl Provider {
    /// Returns the display name for this provider
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Codex => "Codex",
            Provider::Claude => "Claude Code",
        }
    }

    /// Returns the identifier used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Codex => "codex",
            Provider::Claude => "claude",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "codex" | "Codex" => Ok(Provider::Codex),
            "claude" | "Claude" | "claude_code" => Ok(Provider::Claude),
            _ => Err(format!("unknown provider: {}", s)),
        }
    }
}

// ============================================
// Messages
// ============================================

/// One normalized transcript line.
///
/// `raw` keeps the complete original object (in its original key order) so
/// fields the normalizer does not model stay available to consumers.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Provider-supplied id (may be empty)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Session this message was aggregated into
    pub session_id: String,
    /// Parsed timestamp, when the line carried one
    #[serde(rename = "ts", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// user / assistant / system / empty
    #[serde(skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// Extracted human-readable text
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Extracted chain-of-thought text
    #[serde(skip_serializing_if = "String::is_empty")]
    pub thinking: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// message / reasoning / function_call / function_call_output / ...
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub record_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tool_name: String,
    /// The full original JSON object
    pub raw: serde_json::Map<String, serde_json::Value>,
    /// Path relative to the provider root
    pub source: String,
    pub provider: Provider,
    /// Physical 1-based line number within the source file
    pub line_no: u64,
    /// Absolute path of the backing file
    #[serde(skip)]
    pub file: PathBuf,
}

impl Message {
    /// Whether the message carries any extracted text.
    pub fn has_text(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Look up a top-level raw field as a string.
    pub fn raw_str(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(|v| v.as_str())
    }
}

// ============================================
// Sessions
// ============================================

/// Aggregate of every message sharing one session key.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_mod_at: Option<DateTime<Utc>>,
    pub message_count: usize,
    /// Messages with non-empty content
    pub text_count: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cwd: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cwd_base: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub roles: BTreeMap<String, usize>,
    /// Contributing files, relative to their provider root
    pub sources: BTreeSet<String>,
    pub provider: Provider,
    /// Provider-specific grouping (Claude project folder)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project: String,
}

impl Session {
    /// Create an empty session record.
    pub fn new(id: impl Into<String>, provider: Provider, project: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            first_at: None,
            last_at: None,
            file_mod_at: None,
            message_count: 0,
            text_count: 0,
            cwd: String::new(),
            cwd_base: String::new(),
            models: BTreeMap::new(),
            roles: BTreeMap::new(),
            sources: BTreeSet::new(),
            provider,
            project: project.into(),
        }
    }
}

// ============================================
// Stats
// ============================================

/// Aggregate counters over the whole index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub total_messages: usize,
    pub total_sessions: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub by_role: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub by_model: BTreeMap<String, usize>,
    /// Observed top-level raw JSON keys
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, usize>,
    /// Lines that failed to parse as JSON objects
    pub bad_lines: usize,
    pub files_scanned: usize,
    pub last_scan_ms: u64,
}

impl Stats {
    /// Count one ingested message.
    pub(crate) fn record(&mut self, message: &Message) {
        self.total_messages += 1;
        if !message.role.is_empty() {
            *self.by_role.entry(message.role.clone()).or_default() += 1;
        }
        if !message.model.is_empty() {
            *self.by_model.entry(message.model.clone()).or_default() += 1;
        }
        for key in message.raw.keys().filter(|k| !k.is_empty()) {
            *self.fields.entry(key.clone()).or_default() += 1;
        }
    }

    /// Undo [`Stats::record`] for a message leaving the index.
    pub(crate) fn retract(&mut self, message: &Message) {
        self.total_messages = self.total_messages.saturating_sub(1);
        if !message.role.is_empty() {
            decrement(&mut self.by_role, &message.role);
        }
        if !message.model.is_empty() {
            decrement(&mut self.by_model, &message.model);
        }
        for key in message.raw.keys().filter(|k| !k.is_empty()) {
            decrement(&mut self.fields, key);
        }
    }
}

/// Decrement a histogram bucket, dropping it once it reaches zero.
pub(crate) fn decrement(map: &mut BTreeMap<String, usize>, key: &str) {
    if let Some(count) = map.get_mut(key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            map.remove(key);
        }
    }
}
