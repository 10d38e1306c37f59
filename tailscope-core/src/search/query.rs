//! Query language and parser.
//!
//! Queries are whitespace-separated tokens:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `foo` | case-insensitive substring |
//! | `"foo bar"` | case-insensitive phrase |
//! | `foo*` | prefix (matched as a substring) |
//! | `f*o` | wildcard, compiled to a case-insensitive regex |
//! | `/re/i` | regex; only the `i` flag is recognized |
//! | `-foo` | exclude |
//! | `a OR b` | disjunction (the word `OR`, case-sensitive) |
//! | `role:user` | metadata filter on `role`, `type`, `model`, `cwd`, `cwd_base` |
//! | `in:tools` | search scope override (`content`, `tools`, `all`) |
//!
//! The result is disjunctive normal form: OR-groups of AND-clauses. Parsing
//! never fails; an invalid regex becomes a clause that matches nothing.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Compiled size limit for user-supplied patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Which text of a message a query may match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Extracted message content
    #[default]
    Content,
    /// Tool command lines and their captured output
    Tools,
    /// Content first, then tool text
    All,
}

impl Scope {
    /// Lenient conversion: `tools` and `all` (any case), anything else is
    /// [`Scope::Content`].
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_lowercase().as_str() {
            "tools" => Scope::Tools,
            "all" => Scope::All,
            _ => Scope::Content,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Content => "content",
            Scope::Tools => "tools",
            Scope::All => "all",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content" => Ok(Scope::Content),
            "tools" => Ok(Scope::Tools),
            "all" => Ok(Scope::All),
            _ => Err(format!("unknown scope: {} (expected content, tools or all)", s)),
        }
    }
}

/// Metadata a filter clause can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Role,
    Type,
    Model,
    /// Session working directory (substring match)
    Cwd,
    CwdBase,
}

impl FilterField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "role" => Some(FilterField::Role),
            "type" => Some(FilterField::Type),
            "model" => Some(FilterField::Model),
            "cwd" => Some(FilterField::Cwd),
            "cwd_base" => Some(FilterField::CwdBase),
            _ => None,
        }
    }

    pub const ALL: [FilterField; 5] = [
        FilterField::Role,
        FilterField::Type,
        FilterField::Model,
        FilterField::Cwd,
        FilterField::CwdBase,
    ];
}

/// What a clause tests.
#[derive(Debug, Clone)]
pub enum ClauseKind {
    /// Lowercased substring
    Term(String),
    /// Lowercased quoted phrase
    Phrase(String),
    /// Lowercased prefix, matched as a substring
    Prefix(String),
    /// Compiled regex, matched against original-case text
    Regex(Regex),
    /// A regex that failed to compile
    Never,
    /// Metadata filter; evaluated apart from the text groups
    Field { field: FilterField, value: String },
}

/// One atomic condition, possibly negated.
#[derive(Debug, Clone)]
pub struct Clause {
    pub negative: bool,
    pub kind: ClauseKind,
}

impl Clause {
    pub fn is_field(&self) -> bool {
        matches!(self.kind, ClauseKind::Field { .. })
    }

    /// Test a text clause against one target.
    ///
    /// `lower` must be `original` lowercased. Field clauses always pass here.
    pub fn matches_text(&self, original: &str, lower: &str) -> bool {
        match &self.kind {
            ClauseKind::Term(value) | ClauseKind::Phrase(value) | ClauseKind::Prefix(value) => {
                value.is_empty() || lower.contains(value.as_str())
            }
            ClauseKind::Regex(regex) => regex.is_match(original),
            ClauseKind::Never => false,
            ClauseKind::Field { .. } => true,
        }
    }
}

/// A parsed query in disjunctive normal form.
#[derive(Debug, Clone)]
pub struct Query {
    pub scope: Scope,
    /// OR-groups of AND-clauses; never empty
    pub groups: Vec<Vec<Clause>>,
}

impl Query {
    /// Field clauses across every group.
    pub fn field_clauses(&self) -> impl Iterator<Item = &Clause> {
        self.groups.iter().flatten().filter(|c| c.is_field())
    }
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Or,
    Field {
        name: String,
        value: String,
        negative: bool,
    },
    Text {
        raw: String,
        negative: bool,
    },
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_known_field(name: &str) -> bool {
    name == "in" || FilterField::parse(name).is_some()
}

/// Split a raw query into tokens, keeping quoted phrases and `/regex/flags`
/// literals whole.
pub(crate) fn tokenize(input: &str) -> Vec<Token> {
    let s = input.trim();
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if is_space(bytes[i]) {
            i += 1;
            continue;
        }

        let mut negative = false;
        if bytes[i] == b'-' {
            negative = true;
            i += 1;
            while i < bytes.len() && is_space(bytes[i]) {
                i += 1;
            }
        }
        if i >= bytes.len() {
            break;
        }

        // "phrase"
        if bytes[i] == b'"' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] != b'"' {
                j += 1;
            }
            let value = &s[i + 1..j];
            out.push(Token::Text {
                raw: format!("\"{}\"", value),
                negative,
            });
            i = (j + 1).min(bytes.len());
            continue;
        }

        // /regex/flags
        if bytes[i] == b'/' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] != b'/' {
                j += 1;
            }
            let mut k = (j + 1).min(bytes.len());
            while k < bytes.len() && bytes[k].is_ascii_alphabetic() {
                k += 1;
            }
            out.push(Token::Text {
                raw: s[i..k].to_string(),
                negative,
            });
            i = k;
            continue;
        }

        let mut j = i;
        while j < bytes.len() && !is_space(bytes[j]) {
            j += 1;
        }
        let raw = &s[i..j];
        i = j;

        if raw == "OR" {
            out.push(Token::Or);
            continue;
        }

        if let Some(colon) = raw.find(':').filter(|&k| k > 0) {
            let name = raw[..colon].to_lowercase();
            if is_known_field(&name) {
                out.push(Token::Field {
                    name,
                    value: raw[colon + 1..].to_string(),
                    negative,
                });
                continue;
            }
        }

        out.push(Token::Text {
            raw: raw.to_string(),
            negative,
        });
    }

    out
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Rewrite PCRE shorthand classes into explicit ASCII classes.
///
/// Uppercase forms go first so `\S` is not half-rewritten by the `\s` rule.
fn rewrite_shorthands(pattern: &str) -> String {
    pattern
        .replace("\\S", "[^[:space:]]")
        .replace("\\D", "[^0-9]")
        .replace("\\W", "[^A-Za-z0-9_]")
        .replace("\\s", "[[:space:]]")
        .replace("\\d", "[0-9]")
        .replace("\\w", "[A-Za-z0-9_]")
}

fn compile(pattern: &str, case_insensitive: bool) -> ClauseKind {
    match RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
    {
        Ok(regex) => ClauseKind::Regex(regex),
        Err(e) => {
            tracing::debug!(pattern, error = %e, "Invalid regex clause never matches");
            ClauseKind::Never
        }
    }
}

/// Compile a `/pattern/flags` literal.
fn regex_literal(raw: &str) -> ClauseKind {
    let body = &raw[1..];
    let (pattern, flags) = match body.rfind('/') {
        Some(end) => (&body[..end], &body[end + 1..]),
        None => (body, ""),
    };
    // Doubled backslashes usually come from copy-pasted shell examples
    let pattern = rewrite_shorthands(&pattern.replace("\\\\", "\\"));
    compile(&pattern, flags.contains('i'))
}

/// Compile a bare token containing `*`.
fn wildcard(raw: &str) -> ClauseKind {
    let stars = raw.matches('*').count();
    if stars == 1 && raw.ends_with('*') {
        return ClauseKind::Prefix(raw.trim_end_matches('*').to_lowercase());
    }
    let pattern = regex::escape(raw).replace("\\*", ".*");
    compile(&pattern, true)
}

fn text_clause(raw: &str) -> ClauseKind {
    if raw.len() >= 2 && raw.starts_with('/') {
        return regex_literal(raw);
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return ClauseKind::Phrase(strip_quotes(raw).to_lowercase());
    }
    if raw.contains('*') {
        return wildcard(raw);
    }
    ClauseKind::Term(raw.to_lowercase())
}

/// Parse a raw query.
///
/// `scope` applies unless the query carries an `in:` token; the last such
/// token wins and is not kept as a clause.
pub fn parse(raw: &str, scope: Scope) -> Query {
    let mut scope = scope;
    let mut groups: Vec<Vec<Clause>> = Vec::new();
    let mut current: Vec<Clause> = Vec::new();

    for token in tokenize(raw) {
        match token {
            Token::Or => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
            }
            Token::Field { name, value, .. } if name == "in" => {
                scope = Scope::from_hint(strip_quotes(&value));
            }
            Token::Field {
                name,
                value,
                negative,
            } => {
                if let Some(field) = FilterField::parse(&name) {
                    current.push(Clause {
                        negative,
                        kind: ClauseKind::Field {
                            field,
                            value: strip_quotes(&value).to_string(),
                        },
                    });
                }
            }
            Token::Text { raw, negative } => current.push(Clause {
                negative,
                kind: text_clause(&raw),
            }),
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    if groups.is_empty() {
        groups.push(Vec::new());
    }

    Query { scope, groups }
}
