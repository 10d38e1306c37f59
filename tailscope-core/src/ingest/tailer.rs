//! Incremental line reader for append-only JSONL files.
//!
//! # Incremental Reading
//!
//! [`tail`] seeks to the stored [`Cursor`] and reads whole lines to EOF.
//!
//! - **Incomplete last line**: reading stops before a trailing line that has
//!   no `\n` yet. The cursor stays at the end of the last complete line, so
//!   the partial line is read again once the writer finishes it.
//!
//! - **File truncation detected**: when the cursor offset exceeds the current
//!   file size, reading restarts at offset 0 with the line counter reset and
//!   [`TailBatch::truncated`] set.
//!
//! - **Blank lines**: consume a line number but are not returned.

use super::cursor::Cursor;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// One newline-terminated, non-blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailedLine {
    /// Physical 1-based line number
    pub line_no: u64,
    /// Line text without the terminator
    pub text: String,
}

/// Result of one tail pass over a file.
#[derive(Debug, Default)]
pub struct TailBatch {
    pub lines: Vec<TailedLine>,
    /// Position to resume from next pass
    pub cursor: Cursor,
    /// The stored cursor pointed past EOF and reading restarted at zero
    pub truncated: bool,
}

/// Read every complete line appended since `cursor`.
pub fn tail(path: &Path, cursor: Cursor) -> std::io::Result<TailBatch> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();

    let mut batch = TailBatch::default();
    let mut position = cursor;

    if position.offset > file_size {
        tracing::warn!(
            path = %path.display(),
            checkpoint = position.offset,
            file_size,
            "File truncated, starting from beginning"
        );
        position = Cursor::default();
        batch.truncated = true;
    }

    if position.offset == file_size {
        batch.cursor = position;
        return Ok(batch);
    }

    let mut reader = BufReader::new(file);
    if position.offset > 0 {
        reader.seek(SeekFrom::Start(position.offset))?;
    }

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 || buf.last() != Some(&b'\n') {
            // EOF, or a line still being written
            break;
        }

        position.offset += n as u64;
        position.line += 1;

        let text = String::from_utf8_lossy(&buf);
        let text = text.trim_end_matches(['\n', '\r']);
        if text.trim().is_empty() {
            continue;
        }

        batch.lines.push(TailedLine {
            line_no: position.line,
            text: text.to_string(),
        });
    }

    batch.cursor = position;
    Ok(batch)
}
