//! Title override sidecar files.
//!
//! A session retitled by the user gets `<stem>.meta.json` next to its first
//! transcript file:
//!
//! ```json
//! {
//!   "custom_title": "Parser refactor"
//! }
//! ```
//!
//! The sidecar is read when the session is first created, so a custom title
//! survives restarts and reindexing.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Metadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    custom_title: String,
}

/// Read the custom title from a sidecar.
///
/// A missing, unreadable or malformed sidecar, or a blank title, yields
/// `None`.
pub fn read_custom_title(path: &Path) -> Option<String> {
    let data = std::fs::read(path).ok()?;
    let metadata: Metadata = match serde_json::from_slice(&data) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Ignoring malformed sidecar");
            return None;
        }
    };
    let title = metadata.custom_title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Persist a custom title.
pub fn write_custom_title(path: &Path, title: &str) -> Result<()> {
    let metadata = Metadata {
        custom_title: title.to_string(),
    };
    let data = serde_json::to_vec_pretty(&metadata)?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Remove a sidecar; a missing file is not an error.
pub fn remove(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
