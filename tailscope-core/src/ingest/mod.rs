//! Ingestion layer for transcript files
//!
//! This module turns append-only JSONL files into normalized [`Message`]s
//! that the [`Index`](crate::index::Index) aggregates into sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌──────────────────────┐
//! │  Source Files   │ ──► │    Tailer    │ ──► │  RecordNormalizer    │
//! │ (~/.codex/...)  │     │ (CursorStore)│     │  ├─ CodexNormalizer  │
//! └─────────────────┘     └──────────────┘     │  └─ ClaudeNormalizer │
//!                                              └──────────────────────┘
//!                                                         │
//!                                                         ▼
//!                                                  Record → Index
//! ```
//!
//! Discovery, tailing and normalization never fail the sweep: unreadable
//! files are skipped and malformed lines are counted.
//!
//! [`Message`]: crate::types::Message

pub mod cursor;
pub mod extract;
mod normalizer;
pub mod providers;
pub mod tailer;

pub use cursor::{Cursor, CursorStore};
pub use normalizer::{parse_line, Record, RecordNormalizer, SourcePattern};
pub use tailer::{tail, TailBatch, TailedLine};

use crate::types::Provider;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A discovered transcript file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path
    pub path: PathBuf,
    pub provider: Provider,
    /// Provider-specific grouping (Claude project folder, empty for Codex)
    pub project: String,
    /// Session id used for lines that do not name their own session
    pub session_key: String,
    /// Path relative to the provider root
    pub source: String,
    /// Last modification time at discovery
    pub modified_at: Option<DateTime<Utc>>,
}

impl SourceFile {
    /// Path of the title override sidecar: `<stem>.meta.json` beside the file.
    pub fn sidecar_path(&self) -> PathBuf {
        sidecar_path_for(&self.path)
    }
}

/// Sidecar path for any transcript path.
pub fn sidecar_path_for(path: &Path) -> PathBuf {
    let stem = file_stem(path);
    path.with_file_name(format!("{}.meta.json", stem))
}

/// File stem as a string (empty when the path has none).
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Path of `path` relative to `root`, falling back to the full path.
pub(crate) fn relative_source(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Modification time of a file, if it can be read.
pub(crate) fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Discover files across several normalizers.
///
/// Discovery errors for one provider are logged and skipped so the other
/// providers are still swept.
pub fn discover_all(normalizers: &[Box<dyn RecordNormalizer>]) -> Vec<SourceFile> {
    let mut files = Vec::new();
    for normalizer in normalizers {
        match normalizer.discover_files() {
            Ok(found) => files.extend(found),
            Err(e) => tracing::warn!(
                provider = %normalizer.provider(),
                root = %normalizer.root_path().display(),
                error = %e,
                "File discovery failed"
            ),
        }
    }
    files
}
