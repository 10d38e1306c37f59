//! Session aggregation.
//!
//! [`apply`] folds one normalized record into its session: the first cwd
//! seen is frozen, the title is chosen once, and counters, histograms and
//! time bounds are merged. [`retract`] and [`refresh`] undo that when
//! messages leave the index. [`Evicted`] keeps the counters of messages the
//! retention cap dropped so they can still be retracted later.

use super::title::{fallback_title, normalize_candidate, trim_title};
use crate::ingest::Record;
use crate::types::{decrement, Message, Session, Stats};
use std::collections::BTreeMap;
use std::path::Path;

/// Where a session's current title came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TitleSource {
    #[default]
    Unset,
    /// cwd basename, cwd or session id; the first usable content replaces it
    Fallback,
    /// An explicit `title` field, message content or a summary record
    Derived,
    /// A persisted custom title; only a retitle changes it
    Custom,
}

/// Fold one record into its session.
///
/// `title` tracks the origin of the session title. Summary records replace
/// anything but a custom title; content only fills an unset or fallback
/// title.
pub fn apply(session: &mut Session, record: &Record, title: &mut TitleSource) {
    let message = &record.message;

    if session.cwd.is_empty() {
        if let Some(cwd) = record.cwd.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            session.cwd = cwd.to_string();
            session.cwd_base = cwd_base(cwd);
        }
    }

    if *title != TitleSource::Custom {
        if let Some(summary) = &record.summary {
            session.title = trim_title(summary);
            *title = TitleSource::Derived;
        }
    }

    if matches!(*title, TitleSource::Unset | TitleSource::Fallback) {
        let derived = message
            .raw_str("title")
            .and_then(|t| normalize_candidate(t, session))
            .or_else(|| normalize_candidate(&message.content, session));
        if let Some(derived) = derived {
            session.title = derived;
            *title = TitleSource::Derived;
        } else if let Some(fallback) = fallback_title(session) {
            session.title = trim_title(&fallback);
            *title = TitleSource::Fallback;
        }
    }

    session.message_count += 1;
    if message.has_text() {
        session.text_count += 1;
    }
    if let Some(ts) = message.timestamp {
        session.first_at = Some(session.first_at.map_or(ts, |first| first.min(ts)));
        session.last_at = Some(session.last_at.map_or(ts, |last| last.max(ts)));
    }
    if !message.model.is_empty() {
        *session.models.entry(message.model.clone()).or_default() += 1;
    }
    if !message.role.is_empty() {
        *session.roles.entry(message.role.clone()).or_default() += 1;
    }
    if !message.source.is_empty() {
        session.sources.insert(message.source.clone());
    }
}

/// Undo the counters [`apply`] added for a message.
///
/// Time bounds and sources depend on the remaining messages; call
/// [`refresh`] once a batch of retractions is done.
pub fn retract(session: &mut Session, message: &Message) {
    session.message_count = session.message_count.saturating_sub(1);
    if message.has_text() {
        session.text_count = session.text_count.saturating_sub(1);
    }
    if !message.model.is_empty() {
        decrement(&mut session.models, &message.model);
    }
    if !message.role.is_empty() {
        decrement(&mut session.roles, &message.role);
    }
}

/// Counters of messages dropped by the retention cap, for one backing file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Evicted {
    pub messages: usize,
    text: usize,
    roles: BTreeMap<String, usize>,
    models: BTreeMap<String, usize>,
    fields: BTreeMap<String, usize>,
}

impl Evicted {
    /// Remember a message leaving memory while its counters stay applied.
    pub fn add(&mut self, message: &Message) {
        self.messages += 1;
        if message.has_text() {
            self.text += 1;
        }
        if !message.role.is_empty() {
            *self.roles.entry(message.role.clone()).or_default() += 1;
        }
        if !message.model.is_empty() {
            *self.models.entry(message.model.clone()).or_default() += 1;
        }
        for key in message.raw.keys().filter(|k| !k.is_empty()) {
            *self.fields.entry(key.clone()).or_default() += 1;
        }
    }

    /// Take these counters back out of the session they were applied to.
    pub fn retract_from_session(&self, session: &mut Session) {
        session.message_count = session.message_count.saturating_sub(self.messages);
        session.text_count = session.text_count.saturating_sub(self.text);
        for (role, n) in &self.roles {
            subtract(&mut session.roles, role, *n);
        }
        for (model, n) in &self.models {
            subtract(&mut session.models, model, *n);
        }
    }

    /// Take these counters back out of the index-wide stats.
    pub fn retract_from_stats(&self, stats: &mut Stats) {
        stats.total_messages = stats.total_messages.saturating_sub(self.messages);
        for (role, n) in &self.roles {
            subtract(&mut stats.by_role, role, *n);
        }
        for (model, n) in &self.models {
            subtract(&mut stats.by_model, model, *n);
        }
        for (key, n) in &self.fields {
            subtract(&mut stats.fields, key, *n);
        }
    }
}

fn subtract(map: &mut BTreeMap<String, usize>, key: &str, n: usize) {
    if let Some(count) = map.get_mut(key) {
        *count = count.saturating_sub(n);
        if *count == 0 {
            map.remove(key);
        }
    }
}

/// Recompute time bounds and sources from the messages still held.
pub fn refresh<'a>(session: &mut Session, messages: impl IntoIterator<Item = &'a Message>) {
    session.first_at = None;
    session.last_at = None;
    session.sources.clear();
    for message in messages {
        if let Some(ts) = message.timestamp {
            session.first_at = Some(session.first_at.map_or(ts, |first| first.min(ts)));
            session.last_at = Some(session.last_at.map_or(ts, |last| last.max(ts)));
        }
        if !message.source.is_empty() {
            session.sources.insert(message.source.clone());
        }
    }
}

/// Last path component of a working directory.
fn cwd_base(cwd: &str) -> String {
    let trimmed = cwd.trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    Path::new(trimmed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| trimmed.to_string())
}
