//! Record normalizer trait
//!
//! Every provider implements [`RecordNormalizer`] to turn its JSONL records
//! into the shared [`Message`] shape.
//!
//! ## Design Principles
//!
//! 1. **Lossless capture**: every message keeps the complete original object in `raw`
//! 2. **Resilience**: malformed lines are counted by the caller and skipped
//! 3. **One shape**: provider quirks are resolved in [`RecordNormalizer::refine`]
//! 4. **Extensible**: a new provider only requires implementing this trait

use super::extract::{extract_cwd, extract_text, is_event_echo, parse_time, string_or};
use super::SourceFile;
use crate::error::{Error, Result};
use crate::types::{Message, Provider};
use serde_json::{Map, Value};
use std::path::Path;

/// Pattern for discovering transcript files below a provider root.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    /// Glob pattern relative to the provider root (e.g. `sessions/**/*.jsonl`)
    pub pattern: String,
    /// Human-readable description for logging
    pub description: String,
}

/// One normalized line plus the session-level facts it revealed.
#[derive(Debug, Clone)]
pub struct Record {
    pub message: Message,
    /// Working directory found in the line
    pub cwd: Option<String>,
    /// Replacement session title carried by the line
    pub summary: Option<String>,
}

/// Parse one line as a JSON object.
///
/// Returns `None` for anything that is not valid JSON or not an object; the
/// caller counts those as bad lines.
pub fn parse_line(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Trait implemented by all provider normalizers.
pub trait RecordNormalizer: Send + Sync {
    /// Which provider this normalizer handles
    fn provider(&self) -> Provider;

    /// Root directory of this provider's transcripts
    fn root_path(&self) -> &Path;

    /// Patterns for discovering transcript files, relative to [`Self::root_path`].
    fn source_patterns(&self) -> Vec<SourcePattern>;

    /// Describe a discovered file: its project, default session key and
    /// root-relative source name.
    ///
    /// Returns `None` for paths this provider does not own.
    fn describe(&self, path: &Path) -> Option<SourceFile>;

    /// Provider-specific adjustments applied after the common fields are set.
    ///
    /// `raw` is the original object; it is moved into the message once this
    /// returns.
    fn refine(&self, raw: &Map<String, Value>, record: &mut Record);

    /// Discover every file matching this normalizer's patterns.
    ///
    /// A missing root yields no files. The root is glob-escaped, so
    /// directories containing `[` or `*` are matched literally.
    fn discover_files(&self) -> Result<Vec<SourceFile>> {
        let root = self.root_path();
        if !root.is_dir() {
            return Ok(vec![]);
        }

        let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
        let mut files = Vec::new();

        for pattern in self.source_patterns() {
            let full_pattern = format!("{}/{}", escaped_root, pattern.pattern);
            let entries = glob::glob(&full_pattern).map_err(|e| Error::Pattern {
                provider: self.provider().to_string(),
                message: format!("Invalid glob pattern: {}", e),
            })?;

            let before = files.len();
            for entry in entries.flatten() {
                if !entry.is_file() {
                    continue;
                }
                if let Some(file) = self.describe(&entry) {
                    files.push(file);
                }
            }

            tracing::trace!(
                provider = %self.provider(),
                pattern = %pattern.description,
                count = files.len() - before,
                "Discovered files"
            );
        }

        Ok(files)
    }

    /// Normalize one parsed line.
    ///
    /// Returns `None` when the record restates a turn already captured by a
    /// richer record.
    fn normalize(
        &self,
        file: &SourceFile,
        line_no: u64,
        raw: Map<String, Value>,
    ) -> Option<Record> {
        if is_event_echo(&raw) {
            return None;
        }

        let message = Message {
            id: string_or(raw.get("id")),
            session_id: String::new(),
            timestamp: parse_time(&[raw.get("timestamp"), raw.get("ts"), raw.get("created_at")]),
            role: string_or(raw.get("role")),
            content: extract_text(&raw),
            thinking: String::new(),
            model: string_or(raw.get("model")),
            record_type: string_or(raw.get("type")),
            tool_name: string_or(raw.get("tool_name")),
            raw: Map::new(),
            source: file.source.clone(),
            provider: self.provider(),
            line_no,
            file: file.path.clone(),
        };

        let mut record = Record {
            message,
            cwd: extract_cwd(&raw),
            summary: None,
        };
        self.refine(&raw, &mut record);

        if record.message.session_id.is_empty() {
            record.message.session_id = file.session_key.clone();
        }
        record.message.raw = raw;
        Some(record)
    }
}
