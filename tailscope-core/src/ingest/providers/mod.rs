//! Provider-specific normalizers
//!
//! Each supported provider has a module that implements
//! the [`RecordNormalizer`](super::RecordNormalizer) trait.
//!
//! ## Supported Providers
//!
//! | Provider | Module | Root |
//! |----------|--------|------|
//! | Codex | [`codex`] | `~/.codex` |
//! | Claude Code | [`claude`] | `~/.claude/projects` |

mod claude;
mod codex;

pub use claude::ClaudeNormalizer;
pub use codex::CodexNormalizer;

use super::RecordNormalizer;
use crate::config::SourcesConfig;
use crate::types::Provider;
use std::path::PathBuf;

/// Create normalizers for both providers from explicit roots.
pub fn create_all_normalizers(
    codex_root: PathBuf,
    claude_root: PathBuf,
) -> Vec<Box<dyn RecordNormalizer>> {
    vec![
        Box::new(CodexNormalizer::with_root(codex_root)),
        Box::new(ClaudeNormalizer::with_root(claude_root)),
    ]
}

/// Create normalizers for the roots resolved from configuration.
pub fn from_config(sources: &SourcesConfig) -> Vec<Box<dyn RecordNormalizer>> {
    create_all_normalizers(sources.codex_root(), sources.claude_root())
}

/// Get a normalizer for a specific provider rooted at `root`.
pub fn normalizer_for(provider: Provider, root: PathBuf) -> Box<dyn RecordNormalizer> {
    match provider {
        Provider::Codex => Box::new(CodexNormalizer::with_root(root)),
        Provider::Claude => Box::new(ClaudeNormalizer::with_root(root)),
    }
}
