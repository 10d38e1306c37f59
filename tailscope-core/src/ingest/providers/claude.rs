//! Claude Code JSONL normalizer
//!
//! Reads session logs from `~/.claude/projects/[encoded-path]/*.jsonl`.
//!
//! Claude nests role, model and content under a `message` object whose
//! `content` is either a string or an array of `text`, `thinking`,
//! `tool_use` and `tool_result` parts. Text and thinking are kept apart.
//!
//! Sessions are keyed by file, `claude:<project>:<file stem>`, so a resumed
//! conversation appended to the same file stays one session. A `summary`
//! record replaces the session title.

use crate::ingest::extract::{claude_segments, non_blank, string_or};
use crate::ingest::{
    file_stem, modified_at, relative_source, Record, RecordNormalizer, SourceFile,
    SourcePattern,
};
use crate::types::Provider;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};

/// Normalizer for Claude Code JSONL logs.
pub struct ClaudeNormalizer {
    root: PathBuf,
}

impl ClaudeNormalizer {
    /// Create a normalizer for the given projects directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Build the namespaced session id for a project and file stem.
    pub fn session_id(project: &str, stem: &str) -> String {
        format!("claude:{}:{}", project, stem)
    }
}

/// Name of the first `tool_use` part in a message, if any.
fn first_tool_name(message: &Map<String, Value>) -> Option<String> {
    let Some(Value::Array(parts)) = message.get("content") else {
        return None;
    };
    parts
        .iter()
        .filter_map(Value::as_object)
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("tool_use"))
        .find_map(|part| non_blank(part, "name").map(str::to_string))
}

impl RecordNormalizer for ClaudeNormalizer {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    fn root_path(&self) -> &Path {
        &self.root
    }

    fn source_patterns(&self) -> Vec<SourcePattern> {
        vec![SourcePattern {
            pattern: "*/**/*.jsonl".to_string(),
            description: "Claude Code project sessions".to_string(),
        }]
    }

    fn describe(&self, path: &Path) -> Option<SourceFile> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        let project = match components.next()? {
            Component::Normal(name) => name.to_string_lossy().into_owned(),
            _ => return None,
        };
        // The project component must be a directory, not the file itself
        components.next()?;

        Some(SourceFile {
            path: path.to_path_buf(),
            provider: Provider::Claude,
            session_key: Self::session_id(&project, &file_stem(path)),
            project,
            source: relative_source(path, &self.root),
            modified_at: modified_at(path),
        })
    }

    fn refine(&self, raw: &Map<String, Value>, record: &mut Record) {
        let message = &mut record.message;

        if message.id.is_empty() {
            message.id = string_or(raw.get("uuid"));
        }

        if let Some(Value::Object(inner)) = raw.get("message") {
            if message.role.is_empty() {
                message.role = string_or(inner.get("role"));
            }
            if message.model.is_empty() {
                message.model = string_or(inner.get("model"));
            }
            // Nested content wins even when it has no text parts
            if inner.contains_key("content") {
                let (text, thinking) = claude_segments(inner);
                message.content = text;
                if !thinking.trim().is_empty() {
                    message.thinking = thinking;
                }
            }
            if message.tool_name.is_empty() {
                message.tool_name = first_tool_name(inner).unwrap_or_default();
            }
        }

        if message.record_type.eq_ignore_ascii_case("summary") {
            record.summary = non_blank(raw, "summary").map(str::to_string);
        }
    }
}
