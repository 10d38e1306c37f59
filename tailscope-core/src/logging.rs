//! Logging for tailscope
//!
//! Everything goes to a daily file under `$XDG_STATE_HOME/tailscope/`
//! named `tailscope.<YYYY-MM-DD>.log`. stdout and stderr stay free for
//! command output.
//!
//! The poll loop logs every file it tails at `trace` and every sweep at
//! `debug`, which swamps search and mutation events at the same level. The
//! `[logging]` section therefore takes optional per-subsystem levels:
//!
//! ```toml
//! [logging]
//! level = "info"
//! ingest_level = "warn"   # tailscope_core::ingest and ::index
//! search_level = "debug"  # tailscope_core::search
//! ```
//!
//! `RUST_LOG`, when set, replaces all of this.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const FILE_PREFIX: &str = "tailscope";
const FILE_SUFFIX: &str = "log";

/// Modules fed by the ingest level: tailing, normalizing and the index writer
const INGEST_TARGETS: &[&str] = &["tailscope_core::ingest", "tailscope_core::index"];

const SEARCH_TARGETS: &[&str] = &["tailscope_core::search"];

/// Build the event filter for `config`.
///
/// `RUST_LOG` wins when set. Otherwise `level` applies everywhere and the
/// subsystem levels override it for their modules.
pub fn filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    filter_from_config(config)
}

fn filter_from_config(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut directives = vec![config.level.clone()];
    let subsystems = [
        (INGEST_TARGETS, config.ingest_level.as_deref()),
        (SEARCH_TARGETS, config.search_level.as_deref()),
    ];
    for (targets, level) in subsystems {
        if let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) {
            directives.extend(targets.iter().map(|t| format!("{}={}", t, level)));
        }
    }
    let spec = directives.join(",");
    EnvFilter::try_new(&spec)
        .map_err(|e| Error::Logging(format!("invalid level {:?}: {}", spec, e)))
}

/// Initialize file logging.
///
/// Files rotate daily and at most `max_files` are kept. The returned guard
/// must live until exit or buffered events are lost.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix(FILE_SUFFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Logging(e.to_string()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Thread names tell the poll loop apart from the Ctrl+C handler
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(filter(config)?)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(
        log_file = %log_file_path().display(),
        level = %config.level,
        ingest_level = config.ingest_level.as_deref().unwrap_or("-"),
        search_level = config.search_level.as_deref().unwrap_or("-"),
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (to the test writer)
pub fn init_test() {
    let filter = filter(&LoggingConfig::default()).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Keeps the background writer alive; dropping it flushes pending events.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Today's log file. The appender names files by UTC date.
pub fn log_file_path() -> PathBuf {
    Config::state_dir().join(format!(
        "{}.{}.{}",
        FILE_PREFIX,
        Utc::now().format("%Y-%m-%d"),
        FILE_SUFFIX
    ))
}
