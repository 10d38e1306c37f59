//! # tailscope-core
//!
//! Core library for tailscope - a live index and search engine over AI
//! coding-assistant transcripts.
//!
//! This library provides:
//! - Incremental tailing of append-only JSONL transcripts (Codex, Claude Code)
//! - Normalization of both providers' records into one message model
//! - An in-memory session/message index with safe delete and retitle
//! - A small query language and a time-budgeted search executor
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Ingest:** discovery, tailing and per-provider normalization ([`ingest`])
//! - **Index:** session aggregation and snapshot reads ([`index`])
//! - **Search:** query parsing and bounded execution ([`search`])
//!
//! A single poll loop ([`watch`]) drives ingestion; readers and searches run
//! concurrently against snapshots.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tailscope_core::{search, Config, Index};
//!
//! let config = Config::load().expect("failed to load config");
//! let index = Index::new(&config);
//! index.scan_all();
//!
//! let query = search::parse("role:user \"parser\" OR /fn\\s+main/", search::Scope::Content);
//! let response = search::exec(&index, &query, 20, 0);
//! println!("{} hits in {}ms", response.total, response.took_ms);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use index::{Index, ScanSummary};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod search;
pub mod types;
pub mod watch;
