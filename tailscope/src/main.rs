//! tailscope - live index and search for AI coding-assistant transcripts
//!
//! Tails Codex and Claude Code JSONL logs into an in-memory index and
//! answers session, message and search queries against it.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/tailscope/tailscope.<date>.log (~/.local/state/tailscope/)
//! - Config: $XDG_CONFIG_HOME/tailscope/config.toml (~/.config/tailscope/config.toml)

mod output;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tailscope_core::ingest::providers::create_all_normalizers;
use tailscope_core::search::{Executor, Scope};
use tailscope_core::watch::{shutdown_channel, Scheduler};
use tailscope_core::{search, Config, Index, Message};

#[derive(Parser)]
#[command(name = "tailscope")]
#[command(about = "Index and search AI coding-assistant transcripts")]
#[command(version)]
struct Args {
    /// Codex data directory (overrides config and CODEX_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    codex_dir: Option<PathBuf>,

    /// Claude projects directory (overrides config and CLAUDE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    claude_dir: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Keep the index current until Ctrl+C
    Watch {
        /// Poll interval in milliseconds
        #[arg(long)]
        poll: Option<u64>,
    },

    /// Run one sweep and print a summary
    Scan {
        #[arg(long)]
        json: bool,
    },

    /// Drop all index state and re-read every file from the start
    Reindex {
        #[arg(long)]
        json: bool,
    },

    /// List sessions, most recently active first
    Sessions {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },

    /// Print a session's most recent messages as JSON lines
    Messages {
        session: String,
        /// Number of messages (0 for all)
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Search messages
    Search {
        /// Query terms; see the query syntax in the README
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        query: Vec<String>,
        /// content, tools or all (an in: token in the query wins)
        #[arg(long, default_value = "content")]
        scope: Scope,
        /// Page size (0 for the configured default)
        #[arg(long, default_value = "0")]
        limit: i64,
        #[arg(long, default_value = "0")]
        offset: usize,
        #[arg(long)]
        json: bool,
    },

    /// Print aggregate counters as JSON
    Stats,

    /// Delete a session and its transcript files
    DeleteSession { session: String },

    /// Delete one message from its transcript file
    DeleteMessage { session: String, message: String },

    /// Set a custom session title (empty to clear)
    Retitle {
        session: String,
        #[arg(num_args = 0..)]
        title: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    match args.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }

    let _log_guard =
        tailscope_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("tailscope starting");

    let index = build_index(&args, &config);

    match args.command {
        Command::Watch { poll } => run_watch(&index, &config, poll),
        Command::Scan { json } => run_scan(&index, json),
        Command::Reindex { json } => {
            let summary = index.reindex();
            let report = output::ScanReport::new(&summary, &index.stats());
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_scan_report("Reindex", &report);
            }
            tracing::info!(files_scanned = summary.files_scanned, "tailscope reindex complete");
            Ok(())
        }
        Command::Sessions { limit, json } => {
            index.scan_all();
            let sessions = index.sessions();
            let shown = if limit == 0 {
                &sessions[..]
            } else {
                &sessions[..limit.min(sessions.len())]
            };
            if json {
                println!("{}", serde_json::to_string_pretty(shown)?);
            } else {
                output::print_sessions(shown, sessions.len());
            }
            Ok(())
        }
        Command::Messages { session, limit } => {
            index.scan_all();
            if index.session(&session).is_none() {
                bail!("session not found: {}", session);
            }
            let messages = index.messages(&session, limit);
            for message in messages.iter().map(Arc::as_ref) {
                println!("{}", serde_json::to_string::<Message>(message)?);
            }
            Ok(())
        }
        Command::Search {
            query,
            scope,
            limit,
            offset,
            json,
        } => {
            index.scan_all();
            let raw = query.join(" ");
            let query = search::parse(&raw, scope);
            let response = Executor::from_config(&config.search).exec(&index, &query, limit, offset);
            tracing::info!(query = %raw, total = response.total, took_ms = response.took_ms, "Search");
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                output::print_hits(&response);
            }
            Ok(())
        }
        Command::Stats => {
            index.scan_all();
            println!("{}", serde_json::to_string_pretty(&index.stats())?);
            Ok(())
        }
        Command::DeleteSession { session } => {
            index.scan_all();
            index
                .delete_session(&session)
                .with_context(|| format!("failed to delete session {}", session))?;
            println!("Deleted session {}", session);
            Ok(())
        }
        Command::DeleteMessage { session, message } => {
            index.scan_all();
            index
                .delete_message(&session, &message)
                .with_context(|| format!("failed to delete message {}", message))?;
            println!("Deleted message {} from {}", message, session);
            Ok(())
        }
        Command::Retitle { session, title } => {
            index.scan_all();
            index
                .update_session_title(&session, &title.join(" "))
                .with_context(|| format!("failed to retitle session {}", session))?;
            let title = index.session(&session).map(|s| s.title).unwrap_or_default();
            println!("{}: {}", session, title);
            Ok(())
        }
    }
}

/// Create the index over the roots chosen by flags, env and config.
fn build_index(args: &Args, config: &Config) -> Index {
    let codex_root = args
        .codex_dir
        .clone()
        .unwrap_or_else(|| config.sources.codex_root());
    let claude_root = args
        .claude_dir
        .clone()
        .unwrap_or_else(|| config.sources.claude_root());

    tracing::info!(
        codex = %codex_root.display(),
        claude = %claude_root.display(),
        "Provider roots"
    );

    Index::with_normalizers(
        create_all_normalizers(codex_root, claude_root),
        config.index.max_messages_per_session,
    )
}

/// One sweep with a progress bar
fn run_scan(index: &Index, json: bool) -> Result<()> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );

    let summary = index.scan_all_with_progress(|current, total, path| {
        if current == 0 {
            pb.set_length(total as u64);
        }
        pb.set_position(current as u64 + 1);
        pb.set_message(
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("...")
                .to_string(),
        );
    });

    pb.finish_and_clear();

    let report = output::ScanReport::new(&summary, &index.stats());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_scan_report("Scan", &report);
    }

    tracing::info!(
        files_scanned = summary.files_scanned,
        lines_ingested = summary.lines_ingested,
        "tailscope scan complete"
    );

    Ok(())
}

/// Poll until Ctrl+C, printing a line whenever the message total changes
fn run_watch(index: &Index, config: &Config, poll: Option<u64>) -> Result<()> {
    let (trigger, signal) = shutdown_channel();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        trigger.trigger();
    })
    .context("failed to set Ctrl+C handler")?;

    let interval = poll
        .map(|ms| Duration::from_millis(ms.max(1)))
        .unwrap_or_else(|| config.watch.poll_interval());
    let scheduler = Scheduler::new(interval);

    println!(
        "Watch mode active (poll every {}ms). Press Ctrl+C to stop.",
        interval.as_millis()
    );
    println!();

    let mut last_total = None;
    index.run_with(&scheduler, &signal, |iteration, summary| {
        let stats = index.stats();
        if last_total == Some(stats.total_messages) {
            return;
        }
        last_total = Some(stats.total_messages);

        let timestamp = chrono::Local::now().format("%H:%M:%S");
        println!(
            "[{}] {} sessions, {} messages ({} files, +{} lines in {}ms)",
            timestamp,
            stats.total_sessions,
            stats.total_messages,
            summary.files_scanned,
            summary.lines_ingested,
            summary.elapsed.as_millis()
        );
        tracing::info!(
            iteration,
            total_messages = stats.total_messages,
            lines_ingested = summary.lines_ingested,
            "watch iteration"
        );
    });

    println!("Watch mode stopped.");
    tracing::info!("tailscope watch mode stopped");

    Ok(())
}
