//! In-memory index of sessions and messages.
//!
//! [`Index`] owns every [`Session`] and [`Message`]. One reader/writer lock
//! guards all of its maps:
//!
//! - Readers ([`Index::sessions`], [`Index::messages`], [`Index::stats`])
//!   copy a snapshot out under the read lock.
//! - Writers (a file's tail pass, deletes, retitles, reindex) hold the write
//!   lock for the whole mutation, including any file rewrite, so disk and
//!   memory never diverge under concurrent callers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tailscope_core::{Config, Index};
//!
//! let config = Config::load()?;
//! let index = Index::new(&config);
//! let summary = index.scan_all();
//! println!("{} files, {} lines", summary.files_scanned, summary.lines_ingested);
//!
//! for session in index.sessions().iter().take(5) {
//!     println!("{} {}", session.id, session.title);
//! }
//! # Ok::<(), tailscope_core::Error>(())
//! ```

pub mod aggregate;
pub mod sidecar;
pub mod title;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::providers::{create_all_normalizers, from_config};
use crate::ingest::{
    discover_all, parse_line, tail, CursorStore, Record, RecordNormalizer, SourceFile,
    TailedLine,
};
use crate::types::{Message, Provider, Session, Stats};
use aggregate::{Evicted, TitleSource};
use crate::watch::{Scheduler, ShutdownSignal};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Default per-session message retention.
pub const DEFAULT_MAX_MESSAGES: usize = 5000;

/// Outcome of one discovery + tail sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Files visited
    pub files_scanned: usize,
    /// Lines that produced a message
    pub lines_ingested: usize,
    pub elapsed: Duration,
}

struct SessionEntry {
    session: Session,
    /// Retained messages in ingestion order
    messages: VecDeque<Arc<Message>>,
    /// Counters of messages past the retention cap, per backing file
    evicted: HashMap<PathBuf, Evicted>,
    /// Backing files that contributed messages
    files: BTreeSet<PathBuf>,
    /// Title override location, beside the first backing file
    sidecar: PathBuf,
    title: TitleSource,
}

impl SessionEntry {
    fn open(id: &str, file: &SourceFile) -> Self {
        let mut session = Session::new(id, file.provider, file.project.clone());
        let sidecar = file.sidecar_path();
        let mut title = TitleSource::Unset;
        if let Some(custom) = sidecar::read_custom_title(&sidecar) {
            session.title = title::trim_title(&custom);
            title = TitleSource::Custom;
        }
        Self {
            session,
            messages: VecDeque::new(),
            evicted: HashMap::new(),
            files: BTreeSet::new(),
            sidecar,
            title,
        }
    }

    fn refresh(&mut self) {
        aggregate::refresh(&mut self.session, self.messages.iter().map(Arc::as_ref));
    }
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, SessionEntry>,
    /// Sessions each backing file has fed
    file_sessions: HashMap<PathBuf, BTreeSet<String>>,
    cursors: CursorStore,
    stats: Stats,
}

impl State {
    /// Parse, normalize and aggregate one tailed line.
    ///
    /// Returns `true` when the line produced a message.
    fn ingest_line(
        &mut self,
        normalizer: &dyn RecordNormalizer,
        file: &SourceFile,
        line: &TailedLine,
        max_messages: usize,
    ) -> bool {
        let Some(raw) = parse_line(&line.text) else {
            self.stats.bad_lines += 1;
            tracing::debug!(
                path = %file.path.display(),
                line_no = line.line_no,
                "Skipping malformed line"
            );
            return false;
        };
        match normalizer.normalize(file, line.line_no, raw) {
            Some(record) => {
                self.insert(record, file, max_messages);
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, record: Record, file: &SourceFile, max_messages: usize) {
        let session_id = record.message.session_id.clone();
        let entry = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionEntry::open(&session_id, file));

        aggregate::apply(&mut entry.session, &record, &mut entry.title);
        entry.files.insert(file.path.clone());

        let message = Arc::new(record.message);
        self.stats.record(&message);
        entry.messages.push_back(message);
        while entry.messages.len() > max_messages {
            let Some(oldest) = entry.messages.pop_front() else {
                break;
            };
            entry
                .evicted
                .entry(oldest.file.clone())
                .or_default()
                .add(&oldest);
        }

        self.file_sessions
            .entry(file.path.clone())
            .or_default()
            .insert(session_id);
        self.stats.total_sessions = self.sessions.len();
    }

    /// Retract every message read from `path`, including ones the retention
    /// cap already evicted.
    ///
    /// Sessions left with no messages and no other backing file are dropped;
    /// re-reading the file recreates them.
    fn purge_file(&mut self, path: &Path) {
        let Some(session_ids) = self.file_sessions.remove(path) else {
            return;
        };

        let mut purged = 0usize;
        for id in session_ids {
            let Some(entry) = self.sessions.get_mut(&id) else {
                continue;
            };
            let (gone, kept): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut entry.messages)
                .into_iter()
                .partition(|m| m.file == path);
            for message in &gone {
                aggregate::retract(&mut entry.session, message);
                self.stats.retract(message);
            }
            purged += gone.len();
            if let Some(evicted) = entry.evicted.remove(path) {
                evicted.retract_from_session(&mut entry.session);
                evicted.retract_from_stats(&mut self.stats);
                purged += evicted.messages;
            }
            entry.messages = kept;
            entry.files.remove(path);

            if entry.messages.is_empty() && entry.files.is_empty() {
                self.sessions.remove(&id);
            } else {
                entry.refresh();
            }
        }
        self.stats.total_sessions = self.sessions.len();

        tracing::debug!(path = %path.display(), purged, "Purged file for resync");
    }

    /// Record a file's modification time on every session it fed.
    fn touch_file(&mut self, path: &Path, modified: DateTime<Utc>) {
        let Some(session_ids) = self.file_sessions.get(path) else {
            return;
        };
        for id in session_ids {
            if let Some(entry) = self.sessions.get_mut(id) {
                let current = &mut entry.session.file_mod_at;
                if current.map_or(true, |t| modified > t) {
                    *current = Some(modified);
                }
            }
        }
    }

    /// Drop a session and every trace of it.
    fn remove_session(&mut self, id: &str) {
        let Some(entry) = self.sessions.remove(id) else {
            return;
        };
        for message in &entry.messages {
            self.stats.retract(message);
        }
        for evicted in entry.evicted.values() {
            evicted.retract_from_stats(&mut self.stats);
        }
        for path in &entry.files {
            self.cursors.remove(path);
            if let Some(ids) = self.file_sessions.get_mut(path) {
                ids.remove(id);
                if ids.is_empty() {
                    self.file_sessions.remove(path);
                }
            }
        }
        self.stats.total_sessions = self.sessions.len();
    }

    /// Drop one message from a session's in-memory state.
    fn remove_message(&mut self, session_id: &str, message: &Arc<Message>) {
        let Some(entry) = self.sessions.get_mut(session_id) else {
            return;
        };
        let before = entry.messages.len();
        entry.messages.retain(|m| !Arc::ptr_eq(m, message));
        if entry.messages.len() == before {
            return;
        }
        aggregate::retract(&mut entry.session, message);
        entry.refresh();
        self.stats.retract(message);
    }
}

/// The session/message index and its ingestion pipeline.
pub struct Index {
    normalizers: Vec<Box<dyn RecordNormalizer>>,
    max_messages: usize,
    state: RwLock<State>,
}

impl Index {
    /// Create an index over the roots and limits in `config`.
    pub fn new(config: &Config) -> Self {
        Self::with_normalizers(
            from_config(&config.sources),
            config.index.max_messages_per_session,
        )
    }

    /// Create an index over explicit provider roots.
    pub fn with_roots(codex_root: PathBuf, claude_root: PathBuf) -> Self {
        Self::with_normalizers(
            create_all_normalizers(codex_root, claude_root),
            DEFAULT_MAX_MESSAGES,
        )
    }

    /// Create an index from custom normalizers.
    pub fn with_normalizers(
        normalizers: Vec<Box<dyn RecordNormalizer>>,
        max_messages: usize,
    ) -> Self {
        Self {
            normalizers,
            max_messages: max_messages.max(1),
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn normalizer(&self, provider: Provider) -> Option<&dyn RecordNormalizer> {
        self.normalizers
            .iter()
            .find(|n| n.provider() == provider)
            .map(|n| n.as_ref())
    }

    // ============================================
    // Ingestion
    // ============================================

    /// Run one discovery + tail sweep over every provider root.
    pub fn scan_all(&self) -> ScanSummary {
        self.scan_all_with_progress(|_, _, _| {})
    }

    /// Like [`Index::scan_all`], reporting `(index, total, path)` before each file.
    pub fn scan_all_with_progress<F>(&self, mut progress: F) -> ScanSummary
    where
        F: FnMut(usize, usize, &Path),
    {
        let start = Instant::now();
        let files = discover_all(&self.normalizers);
        let total = files.len();

        let mut lines_ingested = 0;
        for (i, file) in files.iter().enumerate() {
            progress(i, total, &file.path);
            lines_ingested += self.scan_file(file);
        }

        let elapsed = start.elapsed();
        {
            let mut state = self.write();
            state.stats.files_scanned = total;
            state.stats.last_scan_ms = elapsed.as_millis() as u64;
        }

        if lines_ingested > 0 {
            tracing::debug!(
                files = total,
                lines = lines_ingested,
                elapsed_ms = elapsed.as_millis() as u64,
                "Scan complete"
            );
        }

        ScanSummary {
            files_scanned: total,
            lines_ingested,
            elapsed,
        }
    }

    /// Tail one file and ingest its new lines under the write lock.
    ///
    /// Returns the number of messages produced. Unreadable files are skipped.
    fn scan_file(&self, file: &SourceFile) -> usize {
        let Some(normalizer) = self.normalizer(file.provider) else {
            return 0;
        };

        let mut guard = self.write();
        let state = &mut *guard;

        if state.cursors.take_resync(&file.path) {
            state.purge_file(&file.path);
        }

        let cursor = state.cursors.get(&file.path);
        let batch = match tail(&file.path, cursor) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::debug!(path = %file.path.display(), error = %e, "Skipping unreadable file");
                return 0;
            }
        };
        if batch.truncated {
            state.purge_file(&file.path);
        }

        let mut ingested = 0;
        for line in &batch.lines {
            if state.ingest_line(normalizer, file, line, self.max_messages) {
                ingested += 1;
            }
        }
        state.cursors.advance(&file.path, batch.cursor);

        if let Some(modified) = file.modified_at {
            state.touch_file(&file.path, modified);
        }

        if ingested > 0 {
            tracing::trace!(path = %file.path.display(), messages = ingested, "Ingested lines");
        }
        ingested
    }

    /// Clear all state and cursors, then rescan every file from byte zero.
    pub fn reindex(&self) -> ScanSummary {
        {
            let mut state = self.write();
            *state = State::default();
        }
        tracing::info!("Reindexing all sources");
        self.scan_all()
    }

    /// Poll until `shutdown` fires: one sweep now, then one per interval.
    pub fn run(&self, scheduler: &Scheduler, shutdown: &ShutdownSignal) {
        self.run_with(scheduler, shutdown, |_, _| {});
    }

    /// [`Index::run`] with a callback after every sweep.
    pub fn run_with<F>(&self, scheduler: &Scheduler, shutdown: &ShutdownSignal, mut on_scan: F)
    where
        F: FnMut(u64, &ScanSummary),
    {
        tracing::info!(
            interval_ms = scheduler.interval().as_millis() as u64,
            "Starting poll loop"
        );
        scheduler.run(shutdown, |iteration| {
            let summary = self.scan_all();
            on_scan(iteration, &summary);
        });
    }

    // ============================================
    // Reads
    // ============================================

    /// Snapshot of every session, most recently active first.
    pub fn sessions(&self) -> Vec<Session> {
        let state = self.read();
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        sessions.sort_by(|a, b| b.last_at.cmp(&a.last_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    /// Every session in [`Index::sessions`] order, paired with its retained
    /// messages. Searches run against this copy without holding the lock.
    pub fn snapshot(&self) -> Vec<(Session, Vec<Arc<Message>>)> {
        let state = self.read();
        let mut entries: Vec<&SessionEntry> = state.sessions.values().collect();
        entries.sort_by(|a, b| {
            b.session
                .last_at
                .cmp(&a.session.last_at)
                .then_with(|| a.session.id.cmp(&b.session.id))
        });
        entries
            .into_iter()
            .map(|entry| {
                (
                    entry.session.clone(),
                    entry.messages.iter().cloned().collect(),
                )
            })
            .collect()
    }

    /// Snapshot of one session.
    pub fn session(&self, id: &str) -> Option<Session> {
        self.read().sessions.get(id).map(|entry| entry.session.clone())
    }

    /// The most recent `limit` messages of a session in ingestion order.
    ///
    /// `limit == 0` returns every retained message. Unknown ids yield an
    /// empty list.
    pub fn messages(&self, session_id: &str, limit: usize) -> Vec<Arc<Message>> {
        let state = self.read();
        let Some(entry) = state.sessions.get(session_id) else {
            return Vec::new();
        };
        let skip = if limit == 0 {
            0
        } else {
            entry.messages.len().saturating_sub(limit)
        };
        entry.messages.iter().skip(skip).cloned().collect()
    }

    /// Snapshot of the aggregate counters.
    pub fn stats(&self) -> Stats {
        self.read().stats.clone()
    }

    // ============================================
    // Mutations
    // ============================================

    /// Delete a session: its backing files, its sidecar and all in-memory state.
    ///
    /// Files already missing on disk are ignored. If a file cannot be
    /// removed for another reason, the files removed before it are purged
    /// from memory and the error is returned; the session keeps whatever the
    /// remaining files contributed, and its sidecar.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut guard = self.write();
        let state = &mut *guard;
        let (files, sidecar_path) = {
            let entry = state
                .sessions
                .get(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
            (entry.files.clone(), entry.sidecar.clone())
        };

        let mut removed: Vec<&PathBuf> = Vec::with_capacity(files.len());
        for path in &files {
            match std::fs::remove_file(path) {
                Ok(()) => removed.push(path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "Backing file already gone");
                    removed.push(path);
                }
                Err(e) => {
                    for gone in &removed {
                        state.purge_file(gone);
                        state.cursors.remove(gone);
                    }
                    tracing::warn!(
                        session_id,
                        path = %path.display(),
                        removed = removed.len(),
                        error = %e,
                        "Session delete stopped partway"
                    );
                    return Err(e.into());
                }
            }
        }
        sidecar::remove(&sidecar_path)?;

        state.remove_session(session_id);
        tracing::info!(session_id, files = files.len(), "Deleted session");
        Ok(())
    }

    /// Delete one message by id, rewriting its backing file without that line.
    ///
    /// The file's cursor is reset afterwards, so the next sweep re-reads it
    /// and re-derives line numbers from the rewritten file.
    pub fn delete_message(&self, session_id: &str, message_id: &str) -> Result<()> {
        let mut guard = self.write();
        let state = &mut *guard;

        let entry = state
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        let message = entry
            .messages
            .iter()
            .find(|m| !message_id.is_empty() && m.id == message_id)
            .cloned()
            .ok_or_else(|| Error::MessageNotFound {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
            })?;

        rewrite_without_line(&message.file, message.line_no)?;

        state.remove_message(session_id, &message);
        state.cursors.reset(&message.file);

        tracing::info!(
            session_id,
            message_id,
            path = %message.file.display(),
            line_no = message.line_no,
            "Deleted message"
        );
        Ok(())
    }

    /// Set a custom session title and persist it to the session's sidecar.
    ///
    /// The title is trimmed like derived titles and is not replaced by later
    /// summary records. A blank title removes the override.
    pub fn update_session_title(&self, session_id: &str, new_title: &str) -> Result<()> {
        let mut state = self.write();
        let entry = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        let trimmed = title::trim_title(new_title);
        if trimmed.is_empty() {
            sidecar::remove(&entry.sidecar)?;
            match title::fallback_title(&entry.session) {
                Some(fallback) => {
                    entry.session.title = title::trim_title(&fallback);
                    entry.title = TitleSource::Fallback;
                }
                None => {
                    entry.session.title = String::new();
                    entry.title = TitleSource::Unset;
                }
            }
        } else {
            sidecar::write_custom_title(&entry.sidecar, &trimmed)?;
            entry.title = TitleSource::Custom;
            entry.session.title = trimmed;
        }

        tracing::info!(session_id, title = %entry.session.title, "Updated session title");
        Ok(())
    }
}

/// Replace `path` with a copy missing physical line `line_no`.
///
/// The copy goes to `<path>.tmp` and is renamed over the original; on any
/// failure the temporary file is removed and the original left untouched.
fn rewrite_without_line(path: &Path, line_no: u64) -> Result<()> {
    let tmp = temp_path(path);
    let result = copy_without_line(path, &tmp, line_no).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(source) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Rewrite {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn copy_without_line(src: &Path, dst: &Path, line_no: u64) -> std::io::Result<()> {
    let mut reader = BufReader::new(File::open(src)?);
    let mut writer = BufWriter::new(File::create(dst)?);
    let mut buf = Vec::new();
    let mut current = 0u64;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        current += 1;
        if current != line_no {
            writer.write_all(&buf)?;
        }
    }
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
