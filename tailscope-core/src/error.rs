//! Error types for tailscope-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tailscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error (sidecar files)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging setup error
    #[error("logging error: {0}")]
    Logging(String),

    /// Invalid discovery pattern for a provider root
    #[error("invalid pattern for {provider} files: {message}")]
    Pattern { provider: String, message: String },

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Message not found within a known session
    #[error("message not found: {message_id} (session {session_id})")]
    MessageNotFound {
        session_id: String,
        message_id: String,
    },

    /// Rewriting or replacing a backing file failed
    #[error("failed to rewrite {}: {source}", path.display())]
    Rewrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this error reports an unknown session or message id.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::SessionNotFound(_) | Error::MessageNotFound { .. }
        )
    }
}

/// Result type alias for tailscope-core
pub type Result<T> = std::result::Result<T, Error>;
