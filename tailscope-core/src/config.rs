//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tailscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tailscope/` (~/.config/tailscope/)
//! - State/Logs: `$XDG_STATE_HOME/tailscope/` (~/.local/state/tailscope/)
//!
//! Provider roots can be overridden with `CODEX_DIR` / `CLAUDE_DIR`.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Expand `~` and `~/...` against the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    if text == "~" {
        return home_dir();
    }
    match text.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Provider root directories
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Poll loop settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// In-memory index limits
    #[serde(default)]
    pub index: IndexConfig,

    /// Search executor tunables
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Override paths for provider roots
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SourcesConfig {
    /// Codex data directory (contains `sessions/`)
    pub codex_path: Option<PathBuf>,
    /// Claude projects directory (one folder per project)
    pub claude_path: Option<PathBuf>,
}

impl SourcesConfig {
    /// Resolved Codex root: `CODEX_DIR`, then config, then `~/.codex`.
    pub fn codex_root(&self) -> PathBuf {
        std::env::var_os("CODEX_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.codex_path.clone())
            .map(|p| expand_home(&p))
            .unwrap_or_else(|| home_dir().join(".codex"))
    }

    /// Resolved Claude root: `CLAUDE_DIR`, then config, then `~/.claude/projects`.
    pub fn claude_root(&self) -> PathBuf {
        std::env::var_os("CLAUDE_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.claude_path.clone())
            .map(|p| expand_home(&p))
            .unwrap_or_else(|| home_dir().join(".claude").join("projects"))
    }
}

/// Poll loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    /// Milliseconds between scan cycles
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn default_poll_interval_ms() -> u64 {
    1500
}

/// Index configuration
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Messages retained in memory per session (oldest dropped first)
    #[serde(default = "default_max_messages_per_session")]
    pub max_messages_per_session: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_messages_per_session: default_max_messages_per_session(),
        }
    }
}

fn default_max_messages_per_session() -> usize {
    5000
}

/// Search configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Soft wall-clock budget per query
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,

    /// Hard cap on hits returned per page
    #[serde(default = "default_max_return")]
    pub max_return: usize,

    /// Page size when the caller passes no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Matches counted before a scan gives up on an exact total
    #[serde(default = "default_count_cap")]
    pub count_cap: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget_ms: default_budget_ms(),
            max_return: default_max_return(),
            default_limit: default_limit(),
            count_cap: default_count_cap(),
        }
    }
}

impl SearchConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.max_return == 0 {
            return Err(Error::Config(
                "search.max_return must be at least 1".to_string(),
            ));
        }
        if self.default_limit == 0 {
            return Err(Error::Config(
                "search.default_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_budget_ms() -> u64 {
    350
}

fn default_max_return() -> usize {
    200
}

fn default_limit() -> usize {
    50
}

fn default_count_cap() -> usize {
    10_000
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Level for tailing and index writes, overriding `level`
    #[serde(default)]
    pub ingest_level: Option<String>,

    /// Level for query parsing and execution, overriding `level`
    #[serde(default)]
    pub search_level: Option<String>,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ingest_level: None,
            search_level: None,
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.search.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tailscope/config.toml` (~/.config/tailscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tailscope").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/tailscope/` (~/.local/state/tailscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tailscope")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.watch.poll_interval_ms, 1500);
        assert_eq!(config.index.max_messages_per_session, 5000);
        assert_eq!(config.search.budget_ms, 350);
        assert_eq!(config.search.max_return, 200);
        assert_eq!(config.search.default_limit, 50);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[sources]
codex_path = "/data/codex"
claude_path = "~/claude-projects"

[watch]
poll_interval_ms = 500

[search]
budget_ms = 100
max_return = 20

[logging]
level = "debug"
search_level = "trace"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(
            config.sources.codex_path.as_deref(),
            Some(Path::new("/data/codex"))
        );
        assert_eq!(config.watch.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.search.budget_ms, 100);
        assert_eq!(config.search.max_return, 20);
        assert_eq!(config.search.default_limit, 50);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.search_level.as_deref(), Some("trace"));
        assert!(config.logging.ingest_level.is_none());
    }

    #[test]
    fn test_search_config_validation() {
        assert!(SearchConfig::default().validate().is_ok());

        let config = SearchConfig {
            max_return: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
        assert_eq!(expand_home(Path::new("~/x")), home_dir().join("x"));
        assert_eq!(expand_home(Path::new("rel/x")), PathBuf::from("rel/x"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[index]\nmax_messages_per_session = 10\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.index.max_messages_per_session, 10);

        std::fs::write(&path, "[search]\ndefault_limit = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
