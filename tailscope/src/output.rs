//! Plain-text rendering for CLI output

use serde::Serialize;
use tailscope_core::search::Response;
use tailscope_core::{ScanSummary, Session, Stats};

/// Width of the title column in session listings
const TITLE_WIDTH: usize = 48;

/// Summary of one `scan` invocation
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub lines_ingested: usize,
    pub elapsed_ms: u64,
    pub sessions: usize,
    pub messages: usize,
    pub bad_lines: usize,
}

impl ScanReport {
    pub fn new(summary: &ScanSummary, stats: &Stats) -> Self {
        Self {
            files_scanned: summary.files_scanned,
            lines_ingested: summary.lines_ingested,
            elapsed_ms: summary.elapsed.as_millis() as u64,
            sessions: stats.total_sessions,
            messages: stats.total_messages,
            bad_lines: stats.bad_lines,
        }
    }
}

pub fn print_scan_report(heading: &str, report: &ScanReport) {
    println!("{} complete:", heading);
    println!("  Files scanned:  {}", report.files_scanned);
    println!("  Lines ingested: {}", report.lines_ingested);
    println!("  Sessions:       {}", report.sessions);
    println!("  Messages:       {}", report.messages);
    if report.bad_lines > 0 {
        println!("  Bad lines:      {}", report.bad_lines);
    }
    println!("  Elapsed:        {}ms", report.elapsed_ms);
}

pub fn print_sessions(sessions: &[Session], total: usize) {
    if sessions.is_empty() {
        println!("No sessions found.");
        return;
    }
    for session in sessions {
        let last = session
            .last_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".repeat(16));
        println!(
            "{}  {:<7} {:>5}  {:<width$}  {}",
            last,
            session.provider.as_str(),
            session.message_count,
            truncate(&session.title, TITLE_WIDTH),
            session.id,
            width = TITLE_WIDTH
        );
    }
    if sessions.len() < total {
        println!("({} of {} sessions)", sessions.len(), total);
    }
}

pub fn print_hits(response: &Response) {
    for hit in &response.hits {
        let ts = hit
            .ts
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!(
            "{} {}:{} [{}] {}",
            ts, hit.source, hit.line_no, hit.field, hit.session_id
        );
        println!("    {}", single_line(&hit.content));
    }
    println!(
        "{} match{}{} in {}ms",
        response.total,
        if response.total == 1 { "" } else { "es" },
        if response.truncated { " (truncated)" } else { "" },
        response.took_ms
    );
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
