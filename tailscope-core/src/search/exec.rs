//! Time-budgeted query execution.

use super::query::{Clause, ClauseKind, FilterField, Query, Scope};
use super::tools::ToolText;
use crate::config::SearchConfig;
use crate::index::Index;
use crate::types::{Message, Session};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// Characters kept in a hit preview.
pub const PREVIEW_CHARS: usize = 240;

/// Which text of a message satisfied the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Content,
    ToolCmd,
    Stdout,
    Stderr,
}

impl MatchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchField::Content => "content",
            MatchField::ToolCmd => "tool_cmd",
            MatchField::Stdout => "stdout",
            MatchField::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One matching message.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub session_id: String,
    pub message_id: String,
    pub role: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub model: String,
    pub source: String,
    pub line_no: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
    pub field: MatchField,
    /// Trimmed preview of the matched field's text
    pub content: String,
}

/// Result page of one execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Response {
    pub took_ms: u64,
    /// The scan stopped early; `total` is a lower bound
    pub truncated: bool,
    /// Matching messages seen, including those before `offset`
    pub total: usize,
    pub hits: Vec<Hit>,
}

/// Query executor with its budget and page limits.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    /// Soft wall-clock budget, checked between messages
    pub budget: Duration,
    /// Largest page a caller may request
    pub max_return: usize,
    /// Page size when the caller passes a non-positive limit
    pub default_limit: usize,
    /// Counting stops once `total` reaches this
    pub count_cap: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(350),
            max_return: 200,
            default_limit: 50,
            count_cap: 10_000,
        }
    }
}

impl Executor {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            budget: Duration::from_millis(config.budget_ms),
            max_return: config.max_return.max(1),
            default_limit: config.default_limit.max(1),
            count_cap: config.count_cap.max(1),
        }
    }

    fn page_size(&self, limit: i64) -> usize {
        let limit = if limit <= 0 {
            self.default_limit
        } else {
            usize::try_from(limit).unwrap_or(usize::MAX)
        };
        limit.min(self.max_return)
    }

    /// Run `query` over a snapshot of `index`.
    ///
    /// Sessions are visited most recent first, messages in ingestion order.
    /// Matches before `offset` are counted but not returned; once the page
    /// is full, matching continues only to refine `total`. The budget is
    /// checked before every message, matching or not; the scan also stops
    /// once `total` reaches `count_cap`. The returned
    /// page is ordered by timestamp (newest first, untimed last), then
    /// source, then line number.
    pub fn exec(&self, index: &Index, query: &Query, limit: i64, offset: usize) -> Response {
        let start = Instant::now();
        let limit = self.page_size(limit);
        let filters = FieldFilters::from_query(query);

        let mut hits = Vec::with_capacity(limit.min(64));
        let mut total = 0usize;
        let mut truncated = false;

        'sessions: for (session, messages) in index.snapshot() {
            for message in &messages {
                if start.elapsed() >= self.budget {
                    truncated = true;
                    break 'sessions;
                }
                if !filters.accepts(message, &session) {
                    continue;
                }
                let Some((field, preview)) = match_text(query, message) else {
                    continue;
                };

                total += 1;
                if total > offset && hits.len() < limit {
                    hits.push(Hit {
                        session_id: message.session_id.clone(),
                        message_id: message.id.clone(),
                        role: message.role.clone(),
                        record_type: message.record_type.clone(),
                        model: message.model.clone(),
                        source: message.source.clone(),
                        line_no: message.line_no,
                        ts: message.timestamp,
                        field,
                        content: preview,
                    });
                }

                if total >= self.count_cap {
                    truncated = true;
                    break 'sessions;
                }
            }
        }

        hits.sort_by(hit_order);

        let took_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            total,
            returned = hits.len(),
            truncated,
            took_ms,
            scope = %query.scope,
            "Search complete"
        );
        Response {
            took_ms,
            truncated,
            total,
            hits,
        }
    }
}

/// Newest first with untimed hits last, then source, then line number.
fn hit_order(a: &Hit, b: &Hit) -> Ordering {
    let by_time = match (a.ts, b.ts) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.line_no.cmp(&b.line_no))
}

// ============================================
// Field filters
// ============================================

/// Allow/deny values per field, gathered across every OR-group.
///
/// Filters are not part of the disjunction: `role:user foo OR bar` requires
/// `role:user` whichever text branch matches.
#[derive(Debug, Default)]
struct FieldFilters {
    rules: Vec<(FilterField, Vec<String>, Vec<String>)>,
}

impl FieldFilters {
    fn from_query(query: &Query) -> Self {
        let mut rules = Vec::new();
        for field in FilterField::ALL {
            let mut allow = Vec::new();
            let mut deny = Vec::new();
            for clause in query.field_clauses() {
                if let ClauseKind::Field { field: f, value } = &clause.kind {
                    if *f != field {
                        continue;
                    }
                    let value = value.trim().to_lowercase();
                    if clause.negative {
                        deny.push(value);
                    } else {
                        allow.push(value);
                    }
                }
            }
            if !allow.is_empty() || !deny.is_empty() {
                rules.push((field, allow, deny));
            }
        }
        Self { rules }
    }

    fn accepts(&self, message: &Message, session: &Session) -> bool {
        self.rules.iter().all(|(field, allow, deny)| {
            let got = match field {
                FilterField::Role => &message.role,
                FilterField::Type => &message.record_type,
                FilterField::Model => &message.model,
                FilterField::Cwd => &session.cwd,
                FilterField::CwdBase => &session.cwd_base,
            };
            let got = got.trim().to_lowercase();
            let allowed = allow.is_empty() || allow.iter().any(|want| value_matches(*field, &got, want));
            allowed && !deny.iter().any(|want| value_matches(*field, &got, want))
        })
    }
}

fn value_matches(field: FilterField, got: &str, want: &str) -> bool {
    if want.is_empty() {
        return true;
    }
    match field {
        // Substring so a parent directory matches its subdirectories
        FilterField::Cwd => got.contains(want),
        _ => got == want,
    }
}

// ============================================
// Text groups
// ============================================

struct Target {
    field: MatchField,
    original: String,
    lower: String,
}

impl Target {
    fn new(field: MatchField, original: String) -> Self {
        let lower = original.to_lowercase();
        Self {
            field,
            original,
            lower,
        }
    }
}

/// In-scope texts in the order they are tried.
fn targets(scope: Scope, message: &Message) -> Vec<Target> {
    let content = || Target::new(MatchField::Content, message.content.clone());
    let tools = || {
        let text = ToolText::from_message(message);
        [
            Target::new(MatchField::ToolCmd, text.cmd),
            Target::new(MatchField::Stdout, text.stdout),
            Target::new(MatchField::Stderr, text.stderr),
        ]
    };
    match scope {
        Scope::Content => vec![content()],
        Scope::Tools => tools().into_iter().collect(),
        Scope::All => std::iter::once(content()).chain(tools()).collect(),
    }
}

fn first_match<'t>(clause: &Clause, targets: &'t [Target]) -> Option<&'t Target> {
    targets
        .iter()
        .find(|t| clause.matches_text(&t.original, &t.lower))
}

/// Evaluate the text DNF; returns the matched field and its preview.
fn match_text(query: &Query, message: &Message) -> Option<(MatchField, String)> {
    let targets = targets(query.scope, message);

    let satisfied = query.groups.iter().find_map(|group| {
        let mut hit: Option<&Target> = None;
        for clause in group.iter().filter(|c| !c.is_field()) {
            let found = first_match(clause, &targets);
            match (clause.negative, found) {
                (true, Some(_)) | (false, None) => return None,
                (false, Some(target)) => {
                    hit.get_or_insert(target);
                }
                (true, None) => {}
            }
        }
        Some(hit)
    })?;

    let target = satisfied.or_else(|| {
        let default = match query.scope {
            Scope::Tools => MatchField::ToolCmd,
            _ => MatchField::Content,
        };
        targets.iter().find(|t| t.field == default)
    })?;
    Some((target.field, preview(&target.original)))
}

fn preview(text: &str) -> String {
    text.trim().chars().take(PREVIEW_CHARS).collect()
}
