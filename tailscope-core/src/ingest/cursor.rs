//! Per-file tailing state.
//!
//! A [`Cursor`] records how far into a transcript file the tailer has read:
//! the byte offset just past the last newline-terminated line, and the
//! physical number of that line. Cursors live only in memory; a restart or a
//! reindex starts every file from zero.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Byte offset and line number reached in one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Bytes consumed, always just past a `\n`
    pub offset: u64,
    /// Physical lines consumed
    pub line: u64,
}

#[derive(Debug, Default)]
struct CursorEntry {
    cursor: Cursor,
    /// Set when the file must be re-derived from byte zero
    resync: bool,
}

/// Map from file path to cursor.
#[derive(Debug, Default)]
pub struct CursorStore {
    entries: HashMap<PathBuf, CursorEntry>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor for a path (zero when unseen).
    pub fn get(&self, path: &Path) -> Cursor {
        self.entries
            .get(path)
            .map(|e| e.cursor)
            .unwrap_or_default()
    }

    /// Record the position reached after a tail pass.
    pub fn advance(&mut self, path: &Path, cursor: Cursor) {
        self.entries.entry(path.to_path_buf()).or_default().cursor = cursor;
    }

    /// Rewind a file to byte zero and flag it for resync.
    ///
    /// The next tail pass purges every message previously read from the file
    /// before re-reading it, so line numbers are re-derived from the file as
    /// it now exists.
    pub fn reset(&mut self, path: &Path) {
        let entry = self.entries.entry(path.to_path_buf()).or_default();
        entry.cursor = Cursor::default();
        entry.resync = true;
    }

    /// Consume the resync flag for a path.
    pub fn take_resync(&mut self, path: &Path) -> bool {
        self.entries
            .get_mut(path)
            .map(|e| std::mem::take(&mut e.resync))
            .unwrap_or(false)
    }

    /// Forget a path entirely.
    pub fn remove(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
