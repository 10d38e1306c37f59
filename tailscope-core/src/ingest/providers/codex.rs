//! OpenAI Codex CLI normalizer
//!
//! Reads session logs from `~/.codex/sessions/YYYY/MM/DD/rollout-*.jsonl`.
//!
//! Codex records are flat envelopes: a `type` such as `response_item`,
//! `event_msg`, `session_meta` or `turn_context`, and a `payload` object
//! holding the actual role, model and content. Older logs put those fields
//! at the top level instead; both shapes are accepted.
//!
//! The session id defaults to the file stem and is overridden by a record's
//! own `session_id`.

use crate::ingest::extract::{extract_cwd, non_blank, string_or};
use crate::ingest::{
    file_stem, modified_at, relative_source, Record, RecordNormalizer, SourceFile,
    SourcePattern,
};
use crate::types::Provider;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Envelope types whose `payload.type` names the real record type.
const WRAPPER_TYPES: &[&str] = &["response_item", "event_msg"];

/// Normalizer for OpenAI Codex CLI JSONL logs.
pub struct CodexNormalizer {
    root: PathBuf,
}

impl CodexNormalizer {
    /// Create a normalizer for the given Codex root (contains `sessions/`).
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }
}

impl RecordNormalizer for CodexNormalizer {
    fn provider(&self) -> Provider {
        Provider::Codex
    }

    fn root_path(&self) -> &Path {
        &self.root
    }

    fn source_patterns(&self) -> Vec<SourcePattern> {
        vec![SourcePattern {
            pattern: "sessions/**/*.jsonl".to_string(),
            description: "Codex session logs".to_string(),
        }]
    }

    fn describe(&self, path: &Path) -> Option<SourceFile> {
        let stem = file_stem(path);
        let session_key = if stem.is_empty() {
            path.file_name()?.to_string_lossy().into_owned()
        } else {
            stem
        };
        Some(SourceFile {
            path: path.to_path_buf(),
            provider: Provider::Codex,
            project: String::new(),
            session_key,
            source: relative_source(path, &self.root),
            modified_at: modified_at(path),
        })
    }

    fn refine(&self, raw: &Map<String, Value>, record: &mut Record) {
        let message = &mut record.message;

        if let Some(session_id) = non_blank(raw, "session_id") {
            message.session_id = session_id.to_string();
        }

        let Some(Value::Object(payload)) = raw.get("payload") else {
            return;
        };

        let top_type = message.record_type.to_lowercase();
        if top_type.is_empty() || WRAPPER_TYPES.contains(&top_type.as_str()) {
            let inner = string_or(payload.get("type"));
            if !inner.is_empty() {
                message.record_type = inner;
            }
        }
        if message.role.is_empty() {
            message.role = string_or(payload.get("role"));
        }
        if message.model.is_empty() {
            message.model = string_or(payload.get("model"));
        }
        if message.tool_name.is_empty() {
            message.tool_name = string_or(payload.get("name"));
        }

        // Reasoning items carry their visible summary as text parts
        if message.thinking.is_empty() && message.record_type == "reasoning" {
            if let Some(Value::Array(parts)) = payload.get("summary") {
                let summary: Vec<&str> = parts
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|part| non_blank(part, "text"))
                    .collect();
                message.thinking = summary.join("\n\n");
            }
        }

        // session_meta and turn_context records keep cwd in the payload
        if record.cwd.is_none() {
            record.cwd = extract_cwd(payload);
        }
    }
}
