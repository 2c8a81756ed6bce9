//! Text rendering for the read-side commands.
//!
//! Times are shown in the local timezone; durations are whole minutes.

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use std::fmt::Write;

use ctx_core::{CommandRecord, FileChangeRecord, Session};

const RULE_WIDTH: usize = 50;
const MAX_COMMAND_WIDTH: usize = 45;
const CONTEXT_PREVIEW_LINES: usize = 3;

/// A session with the activity shown beside it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: Session,
    pub files: Vec<FileChangeRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandRecord>,
}

pub fn render_current(report: &SessionReport, now: DateTime<Utc>) -> String {
    let session = &report.session;
    let mut out = String::new();

    rule(&mut out, '=');
    let _ = writeln!(out, " CONTEXT: {} ({})", session.branch_label(), session.repo_name());
    let _ = writeln!(out, " Session: {} ago", format_duration(session.duration(now)));
    rule(&mut out, '=');

    let _ = writeln!(out, "\n Branch:  {}", session.branch_label());
    let _ = writeln!(out, " Repo:    {}", session.repo_path);

    if !report.files.is_empty() {
        let _ = writeln!(out, "\n Files modified:");
        for file in &report.files {
            let _ = writeln!(
                out,
                "   {} (+{} edits) @ {}",
                file.filepath,
                file.lines_changed,
                format_clock(file.timestamp)
            );
        }

        let latest = &report.files[0];
        let preview = context_preview(&latest.context);
        if !preview.is_empty() {
            let _ = writeln!(out, "\n Last edit context ({}):", latest.filepath);
            for line in preview {
                let _ = writeln!(out, "   {}", line);
            }
        }
    }

    if !report.commands.is_empty() {
        let _ = writeln!(out, "\n Recent commands:");
        // Stored newest first; shown oldest to newest.
        for command in report.commands.iter().rev() {
            let _ = writeln!(
                out,
                "   [{}] {} @ {}",
                exit_status(command.exit_code),
                truncate(&command.command, MAX_COMMAND_WIDTH),
                format_clock(command.timestamp)
            );
        }
    }

    rule(&mut out, '=');
    out
}

pub fn render_day(date: NaiveDate, reports: &[SessionReport], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    let _ = writeln!(out, " SESSIONS: {}", date.format("%A, %B %d"));
    rule(&mut out, '=');

    for report in reports {
        let session = &report.session;
        let _ = writeln!(
            out,
            "\n [{}] {} ({}) - {}",
            format_clock(session.started_at),
            session.branch_label(),
            session.repo_name(),
            format_duration(session.duration(now))
        );
        for file in &report.files {
            let _ = writeln!(out, "   - {}", file.filepath);
        }
    }

    rule(&mut out, '=');
    out
}

pub fn render_list(sessions: &[Session], limit: usize, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    let _ = writeln!(out, " RECENT SESSIONS (last {})", limit);
    rule(&mut out, '=');

    let mut current_date = None;
    for session in sessions {
        let date = session.started_at.with_timezone(&Local).date_naive();
        if current_date != Some(date) {
            current_date = Some(date);
            let _ = writeln!(out, "\n {}", date.format("%Y-%m-%d"));
            let _ = writeln!(out, " {}", "-".repeat(40));
        }

        let marker = if session.is_active() { " *" } else { "" };
        let _ = writeln!(
            out,
            "   [{}] {:20} ({}) {}{}",
            format_clock(session.started_at),
            session.branch_label(),
            session.repo_name(),
            format_duration(session.duration(now)),
            marker
        );
    }

    rule(&mut out, '=');
    out
}

pub fn render_branch(needle: &str, reports: &[SessionReport], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    let _ = writeln!(out, " SESSIONS: branch ~ {}", needle);
    rule(&mut out, '=');

    for report in reports {
        let session = &report.session;
        let _ = writeln!(
            out,
            "\n {} - {}",
            session
                .started_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            format_duration(session.duration(now))
        );
        let _ = writeln!(out, "   Branch: {}", session.branch_label());
        let _ = writeln!(out, "   Repo:   {}", session.repo_name());
        if !report.files.is_empty() {
            let _ = writeln!(out, "   Files:");
            for file in &report.files {
                let _ = writeln!(out, "     - {}", file.filepath);
            }
        }
    }

    rule(&mut out, '=');
    out
}

/// `1h 5m`, or `12m` under an hour. Negative spans (clock skew) show as `0m`.
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

fn format_clock(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}

fn exit_status(code: i32) -> String {
    if code == 0 {
        "ok".to_string()
    } else {
        format!("x{}", code)
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn context_preview(context: &str) -> Vec<&str> {
    let trimmed = context.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    let skip = lines.len().saturating_sub(CONTEXT_PREVIEW_LINES);
    lines[skip..].to_vec()
}

fn rule(out: &mut String, ch: char) {
    let _ = writeln!(out, "{}", ch.to_string().repeat(RULE_WIDTH));
}
