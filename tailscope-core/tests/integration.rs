//! Integration tests for the tailscope ingestion pipeline and search engine
//!
//! Fixture transcripts live in `tests/fixtures/{codex,claude}/` and are
//! copied into a temporary directory per test, since several tests rewrite
//! or delete the backing files.

use chrono::{TimeZone, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tailscope_core::ingest::providers::create_all_normalizers;
use tailscope_core::ingest::sidecar_path_for;
use tailscope_core::search::{self, Executor, MatchField, Scope};
use tailscope_core::{Index, Provider};
use tempfile::TempDir;

const CODEX_FILE: &str = "sessions/2025/01/15/rollout-2025-01-15T10-00-00-abc123.jsonl";
const CODEX_SESSION: &str = "rollout-2025-01-15T10-00-00-abc123";
const CLAUDE_FILE: &str = "-home-dev-widgets/7f3c2a10-0000-4000-8000-000000000001.jsonl";
const CLAUDE_SESSION: &str = "claude:-home-dev-widgets:7f3c2a10-0000-4000-8000-000000000001";

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn copy_tree(src: &Path, dst: &Path) {
    std::fs::create_dir_all(dst).unwrap();
    for entry in std::fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Temporary provider roots, optionally seeded with the fixtures.
struct Roots {
    _dir: TempDir,
    codex: PathBuf,
    claude: PathBuf,
}

impl Roots {
    fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let codex = dir.path().join("codex");
        let claude = dir.path().join("claude");
        std::fs::create_dir_all(codex.join("sessions")).unwrap();
        std::fs::create_dir_all(&claude).unwrap();
        Self {
            _dir: dir,
            codex,
            claude,
        }
    }

    fn with_fixtures() -> Self {
        let roots = Self::empty();
        copy_tree(&fixtures_dir().join("codex"), &roots.codex);
        copy_tree(&fixtures_dir().join("claude"), &roots.claude);
        roots
    }

    fn index(&self) -> Index {
        Index::with_roots(self.codex.clone(), self.claude.clone())
    }

    fn capped_index(&self, max_messages: usize) -> Index {
        Index::with_normalizers(
            create_all_normalizers(self.codex.clone(), self.claude.clone()),
            max_messages,
        )
    }

    fn codex_file(&self, name: &str) -> PathBuf {
        self.codex.join("sessions").join(name)
    }

    fn write_codex(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.codex_file(name);
        let mut data = lines.join("\n");
        data.push('\n');
        std::fs::write(&path, data).unwrap();
        path
    }
}

fn append(path: &Path, data: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(data.as_bytes()).unwrap();
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path).unwrap().lines().count()
}

// ============================================
// End-to-end ingestion
// ============================================

#[test]
fn test_two_session_scenario() {
    let roots = Roots::empty();
    roots.write_codex(
        "mixed.jsonl",
        &[
            r#"{"session_id":"s1","id":"a","role":"user","content":"Build a CLI tool","model":"gpt-4","cwd":"/home/user/project1","ts":"2025-01-01T10:00:00Z"}"#,
            r#"{"session_id":"s1","id":"b","role":"assistant","content":"Sure, here is a plan","ts":"2025-01-01T10:00:05Z"}"#,
            r#"{"session_id":"s2","id":"c","role":"user","title":"Project Setup","content":"Let's start","environment_context":"<environment_context><cwd>/workspace/app</cwd></environment_context>","ts":"2025-01-01T11:00:00Z"}"#,
        ],
    );

    let index = roots.index();
    let summary = index.scan_all();
    assert_eq!(summary.files_scanned, 1);
    assert_eq!(summary.lines_ingested, 3);

    let stats = index.stats();
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.total_messages, 3);

    let sessions = index.sessions();
    assert_eq!(sessions[0].id, "s2");
    assert_eq!(sessions[0].title, "Project Setup");
    assert_eq!(sessions[0].cwd, "/workspace/app");
    assert_eq!(sessions[0].cwd_base, "app");

    let s1 = index.session("s1").unwrap();
    assert_eq!(s1.cwd, "/home/user/project1");
    assert_eq!(s1.cwd_base, "project1");
    assert_eq!(s1.title, "Build a CLI tool");
    assert_eq!(s1.message_count, 2);
    assert_eq!(s1.models.get("gpt-4"), Some(&1));
    assert_eq!(
        s1.first_at,
        Some(Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap())
    );

    let last = index.messages("s1", 1);
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].role, "assistant");
    assert_eq!(last[0].content, "Sure, here is a plan");
}

#[test]
fn test_codex_fixture() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let session = index.session(CODEX_SESSION).unwrap();
    assert_eq!(session.provider, Provider::Codex);
    assert_eq!(session.cwd, "/home/dev/widgets");
    assert_eq!(session.cwd_base, "widgets");
    // The cwd from session_meta only holds the title until the first prompt
    assert_eq!(session.title, "Fix the failing build in the parser crate");
    // Nine lines, one event echo dropped
    assert_eq!(session.message_count, 8);
    assert!(session.sources.contains(CODEX_FILE));
    assert!(session.file_mod_at.is_some());

    let messages = index.messages(CODEX_SESSION, 0);
    let types: Vec<&str> = messages.iter().map(|m| m.record_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "session_meta",
            "message",
            "message",
            "turn_context",
            "reasoning",
            "function_call",
            "function_call_output",
            "message",
        ]
    );
    // Physical line numbers survive the dropped echo on line 4
    let line_nos: Vec<u64> = messages.iter().map(|m| m.line_no).collect();
    assert_eq!(line_nos, vec![1, 2, 3, 5, 6, 7, 8, 9]);

    assert_eq!(messages[2].content, "Fix the failing build in the parser crate");
    assert_eq!(messages[4].thinking, "Planning to run the build first");
    assert_eq!(messages[5].tool_name, "shell");
    assert_eq!(messages[3].model, "gpt-5-codex");
}

#[test]
fn test_claude_fixture() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let session = index.session(CLAUDE_SESSION).unwrap();
    assert_eq!(session.provider, Provider::Claude);
    assert_eq!(session.project, "-home-dev-widgets");
    assert_eq!(session.title, "Parser test hang");
    assert_eq!(session.cwd, "/home/dev/widgets");
    assert_eq!(session.message_count, 5);
    assert_eq!(session.models.get("claude-sonnet-4-5"), Some(&2));

    let messages = index.messages(CLAUDE_SESSION, 0);
    let u2 = messages.iter().find(|m| m.id == "u2").unwrap();
    assert_eq!(u2.content, "Let me run the tests with output.");
    assert_eq!(u2.thinking, "Probably a deadlock in the watcher tests");
    assert_eq!(u2.tool_name, "Bash");

    // Blank and malformed lines still count toward line numbers
    let u4 = messages.iter().find(|m| m.id == "u4").unwrap();
    assert_eq!(u4.line_no, 7);
    assert_eq!(index.stats().bad_lines, 1);
}

#[test]
fn test_repoll_is_idempotent() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();
    let before = index.stats();

    let summary = index.scan_all();
    assert_eq!(summary.lines_ingested, 0);
    let after = index.stats();
    assert_eq!(after.total_messages, before.total_messages);
    assert_eq!(after.total_sessions, before.total_sessions);
    assert_eq!(after.bad_lines, before.bad_lines);
}

#[test]
fn test_appended_lines_and_partial_line() {
    let roots = Roots::empty();
    let path = roots.write_codex(
        "grow.jsonl",
        &[r#"{"id":"m1","role":"user","content":"first"}"#],
    );
    let index = roots.index();
    index.scan_all();
    assert_eq!(index.messages("grow", 0).len(), 1);

    // A line without its newline is held back
    append(&path, r#"{"id":"m2","role":"assistant","content":"sec"#);
    index.scan_all();
    assert_eq!(index.messages("grow", 0).len(), 1);
    assert_eq!(index.stats().bad_lines, 0);

    append(&path, "ond\"}\n");
    index.scan_all();
    let messages = index.messages("grow", 0);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "second");
    assert_eq!(messages[1].line_no, 2);
}

#[test]
fn test_truncation_resyncs_file() {
    let roots = Roots::empty();
    let path = roots.write_codex(
        "trunc.jsonl",
        &[
            r#"{"id":"m1","role":"user","content":"alpha"}"#,
            r#"{"id":"m2","role":"assistant","content":"beta"}"#,
        ],
    );
    let index = roots.index();
    index.scan_all();
    assert_eq!(index.stats().total_messages, 2);

    std::fs::write(&path, "{\"id\":\"m9\",\"role\":\"user\",\"content\":\"gamma\"}\n").unwrap();
    index.scan_all();

    let messages = index.messages("trunc", 0);
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m9"]);
    assert_eq!(messages[0].line_no, 1);
    assert_eq!(index.stats().total_messages, 1);
    assert_eq!(index.session("trunc").unwrap().message_count, 1);
}

#[test]
fn test_title_rejects_generated_identifier() {
    let roots = Roots::empty();
    roots.write_codex(
        "t.jsonl",
        &[r#"{"id":"m1","role":"user","title":"rollout-2025-01-02T03-04-05-abc123","content":"Refactor the tailer"}"#],
    );
    let index = roots.index();
    index.scan_all();
    assert_eq!(index.session("t").unwrap().title, "Refactor the tailer");
}

// ============================================
// Mutations
// ============================================

#[test]
fn test_delete_message_rewrites_file() {
    let roots = Roots::empty();
    let path = roots.write_codex(
        "del.jsonl",
        &[
            r#"{"id":"m1","role":"user","content":"keep one"}"#,
            r#"{"id":"m2","role":"assistant","content":"remove me"}"#,
            r#"{"id":"m3","role":"user","content":"keep three"}"#,
        ],
    );
    let index = roots.index();
    index.scan_all();

    index.delete_message("del", "m2").unwrap();
    assert_eq!(line_count(&path), 2);
    assert!(!std::fs::read_to_string(&path).unwrap().contains("remove me"));
    assert_eq!(index.messages("del", 0).len(), 2);
    assert_eq!(index.stats().total_messages, 2);

    // Re-reading the rewritten file must not duplicate messages
    index.scan_all();
    let messages = index.messages("del", 0);
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m3"]);
    assert_eq!(messages[1].line_no, 2);
    assert_eq!(index.session("del").unwrap().message_count, 2);
    assert_eq!(index.stats().total_messages, 2);
}

#[test]
fn test_retention_cap_counters_survive_resync() {
    let roots = Roots::empty();
    let lines: Vec<String> = (1..=5)
        .map(|i| format!(r#"{{"id":"m{i}","role":"user","content":"message {i}"}}"#))
        .collect();
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    roots.write_codex("capped.jsonl", &lines);

    let index = roots.capped_index(3);
    index.scan_all();
    assert_eq!(index.messages("capped", 0).len(), 3);
    assert_eq!(index.session("capped").unwrap().message_count, 5);
    assert_eq!(index.stats().total_messages, 5);

    index.delete_message("capped", "m5").unwrap();
    assert_eq!(index.stats().total_messages, 4);

    // The resync retracts evicted messages as well as retained ones
    index.scan_all();
    let session = index.session("capped").unwrap();
    assert_eq!(session.message_count, 4);
    assert_eq!(session.roles.get("user"), Some(&4));
    let stats = index.stats();
    assert_eq!(stats.total_messages, 4);
    assert_eq!(stats.by_role.get("user"), Some(&4));
    let ids: Vec<String> = index
        .messages("capped", 0)
        .iter()
        .map(|m| m.id.clone())
        .collect();
    assert_eq!(ids, vec!["m2", "m3", "m4"]);

    // Truncation takes the same path
    roots.write_codex("capped.jsonl", &[r#"{"id":"n1","role":"user","content":"fresh"}"#]);
    index.scan_all();
    assert_eq!(index.session("capped").unwrap().message_count, 1);
    assert_eq!(index.stats().total_messages, 1);
}

#[test]
fn test_delete_message_not_found() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let err = index.delete_message(CLAUDE_SESSION, "nope").unwrap_err();
    assert!(err.is_not_found());
    let err = index.delete_message(CLAUDE_SESSION, "").unwrap_err();
    assert!(err.is_not_found());
    let err = index.delete_message("missing", "u1").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(line_count(&roots.claude.join(CLAUDE_FILE)), 7);
}

#[test]
fn test_delete_session_removes_files() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();
    index
        .update_session_title(CLAUDE_SESSION, "Custom name")
        .unwrap();

    let file = roots.claude.join(CLAUDE_FILE);
    index.delete_session(CLAUDE_SESSION).unwrap();

    assert!(!file.exists());
    assert!(!sidecar_path_for(&file).exists());
    assert!(index.session(CLAUDE_SESSION).is_none());
    assert_eq!(index.stats().total_sessions, 1);
    assert_eq!(index.stats().total_messages, 8);

    index.scan_all();
    assert!(index.session(CLAUDE_SESSION).is_none());
    assert!(index.delete_session(CLAUDE_SESSION).unwrap_err().is_not_found());
}

#[test]
fn test_delete_session_failure_keeps_index_in_step_with_disk() {
    let roots = Roots::empty();
    let first = roots.write_codex(
        "a.jsonl",
        &[
            r#"{"session_id":"shared","id":"a1","role":"user","content":"from a"}"#,
            r#"{"session_id":"shared","id":"a2","role":"assistant","content":"also a"}"#,
        ],
    );
    let second = roots.write_codex(
        "b.jsonl",
        &[r#"{"session_id":"shared","id":"b1","role":"user","content":"from b"}"#],
    );
    let index = roots.index();
    index.scan_all();
    assert_eq!(index.session("shared").unwrap().message_count, 3);

    // A directory in place of the second file makes its removal fail
    std::fs::remove_file(&second).unwrap();
    std::fs::create_dir(&second).unwrap();

    assert!(index.delete_session("shared").is_err());
    assert!(!first.exists());

    let session = index.session("shared").unwrap();
    assert_eq!(session.message_count, 1);
    let ids: Vec<String> = index
        .messages("shared", 0)
        .iter()
        .map(|m| m.id.clone())
        .collect();
    assert_eq!(ids, vec!["b1"]);
    assert_eq!(index.stats().total_messages, 1);
}

#[test]
fn test_retitle_persists_across_reindex() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    index
        .update_session_title(CLAUDE_SESSION, "  Hang investigation  ")
        .unwrap();
    assert_eq!(
        index.session(CLAUDE_SESSION).unwrap().title,
        "Hang investigation"
    );
    let sidecar = sidecar_path_for(&roots.claude.join(CLAUDE_FILE));
    assert!(sidecar.exists());

    // The summary record no longer replaces the custom title
    index.reindex();
    assert_eq!(
        index.session(CLAUDE_SESSION).unwrap().title,
        "Hang investigation"
    );

    // A fresh index reads the sidecar too
    let fresh = roots.index();
    fresh.scan_all();
    assert_eq!(
        fresh.session(CLAUDE_SESSION).unwrap().title,
        "Hang investigation"
    );

    // A blank title drops the override
    fresh.update_session_title(CLAUDE_SESSION, "   ").unwrap();
    assert!(!sidecar.exists());
    fresh.reindex();
    assert_eq!(
        fresh.session(CLAUDE_SESSION).unwrap().title,
        "Parser test hang"
    );
}

#[test]
fn test_retitle_truncates_long_titles() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let long = "ü".repeat(200);
    index.update_session_title(CODEX_SESSION, &long).unwrap();
    let title = index.session(CODEX_SESSION).unwrap().title;
    assert!(title.ends_with('…'));
    assert!(title.chars().count() <= 81);
}

// ============================================
// Search
// ============================================

#[test]
fn test_search_content_and_field_filters() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let response = search::exec(&index, &search::parse("build", Scope::Content), 0, 0);
    assert_eq!(response.total, 2);
    assert!(!response.truncated);
    assert!(response.hits.iter().all(|h| h.session_id == CODEX_SESSION));
    assert!(response.hits.iter().all(|h| h.field == MatchField::Content));

    let query = search::parse("role:assistant build", Scope::Content);
    let response = search::exec(&index, &query, 0, 0);
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].line_no, 9);

    // Field filters hold for every OR branch
    let query = search::parse("role:user build OR shutdown", Scope::Content);
    let response = search::exec(&index, &query, 0, 0);
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].role, "user");

    let query = search::parse("cwd:/home/dev cwd_base:widgets tests", Scope::Content);
    assert_eq!(search::exec(&index, &query, 0, 0).total, 2);
}

#[test]
fn test_search_tools_scope() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let query = search::parse(r"/cargo\s+build/", Scope::Tools);
    let response = search::exec(&index, &query, 10, 0);
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].field, MatchField::ToolCmd);
    assert_eq!(response.hits[0].content, "bash -lc cargo build -p parser");

    let query = search::parse("in:tools mismatched", Scope::Content);
    let response = search::exec(&index, &query, 10, 0);
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].field, MatchField::Stdout);

    let query = search::parse("\"unused variable\"", Scope::Tools);
    let response = search::exec(&index, &query, 10, 0);
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].field, MatchField::Stderr);
    assert_eq!(response.hits[0].message_id, "u3");

    // Tool output is invisible to content searches
    let query = search::parse("mismatched", Scope::Content);
    assert_eq!(search::exec(&index, &query, 10, 0).total, 0);
    let query = search::parse("mismatched", Scope::All);
    assert_eq!(search::exec(&index, &query, 10, 0).total, 1);
}

#[test]
fn test_search_wildcards_and_negation() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let query = search::parse("dead*", Scope::Content);
    assert_eq!(search::exec(&index, &query, 0, 0).total, 0);

    let query = search::parse("sh*down", Scope::Content);
    assert_eq!(search::exec(&index, &query, 0, 0).total, 1);

    let query = search::parse("tests -hang", Scope::Content);
    let response = search::exec(&index, &query, 0, 0);
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].message_id, "u2");

    let query = search::parse("/(unclosed/ OR shutdown", Scope::Content);
    assert_eq!(search::exec(&index, &query, 0, 0).total, 1);
}

#[test]
fn test_search_paging_and_order() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let everything = search::exec(&index, &search::parse("", Scope::Content), 0, 0);
    assert_eq!(everything.total, 13);
    // Newest first
    assert_eq!(everything.hits[0].message_id, "u4");
    let times: Vec<_> = everything.hits.iter().filter_map(|h| h.ts).collect();
    assert!(times.windows(2).all(|w| w[0] >= w[1]));

    let page = search::exec(&index, &search::parse("", Scope::Content), 3, 10);
    assert_eq!(page.total, 13);
    assert_eq!(page.hits.len(), 3);

    let executor = Executor {
        max_return: 2,
        ..Executor::default()
    };
    let capped = executor.exec(&index, &search::parse("", Scope::Content), 50, 0);
    assert_eq!(capped.hits.len(), 2);
    assert_eq!(capped.total, 13);

    let counted = Executor {
        count_cap: 4,
        ..Executor::default()
    };
    let response = counted.exec(&index, &search::parse("", Scope::Content), 2, 0);
    assert!(response.truncated);
    assert_eq!(response.total, 4);
    assert_eq!(response.hits.len(), 2);
}

#[test]
fn test_search_budget_applies_to_non_matching_messages() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let spent = Executor {
        budget: std::time::Duration::ZERO,
        ..Executor::default()
    };
    let query = search::parse("zzqqxx", Scope::All);
    let response = spent.exec(&index, &query, 0, 0);
    assert!(response.truncated);
    assert_eq!(response.total, 0);

    let relaxed = Executor::default().exec(&index, &query, 0, 0);
    assert!(!relaxed.truncated);
    assert_eq!(relaxed.total, 0);
}

#[test]
fn test_search_hit_serialization() {
    let roots = Roots::with_fixtures();
    let index = roots.index();
    index.scan_all();

    let response = search::exec(&index, &search::parse("shutdown", Scope::Content), 0, 0);
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["total"], 1);
    assert_eq!(value["truncated"], false);
    let hit = &value["hits"][0];
    assert_eq!(hit["session_id"], CLAUDE_SESSION);
    assert_eq!(hit["message_id"], "u4");
    assert_eq!(hit["type"], "assistant");
    assert_eq!(hit["field"], "content");
    assert_eq!(hit["source"], CLAUDE_FILE);
    assert_eq!(hit["line_no"], 7);
}
