//! Records persisted by the store and the git context they are keyed on.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A contiguous span of work in one (repository, branch) context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: i64,
    pub repo_path: String,
    /// `None` means detached HEAD.
    pub branch: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Last path component of the repository, for display.
    pub fn repo_name(&self) -> &str {
        Path::new(&self.repo_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.repo_path)
    }

    pub fn branch_label(&self) -> &str {
        self.branch.as_deref().unwrap_or("detached")
    }

    /// Wall time from start to end, or to `now` while still open.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.ended_at.unwrap_or(now) - self.started_at
    }
}

/// Aggregate of edits to one file within one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChangeRecord {
    pub session_id: i64,
    pub filepath: String,
    pub context: String,
    /// Activity count: one per observed modification, not a diff size.
    pub lines_changed: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub id: i64,
    pub session_id: i64,
    pub command: String,
    pub exit_code: i32,
    pub cwd: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of resolving git context for a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitContext {
    /// Absolute repository root, `None` outside any working tree.
    pub repo: Option<PathBuf>,
    /// Current branch, `None` on detached HEAD or resolution failure.
    pub branch: Option<String>,
}

impl GitContext {
    pub fn new(repo: impl Into<PathBuf>, branch: Option<&str>) -> Self {
        Self {
            repo: Some(repo.into()),
            branch: branch.map(str::to_string),
        }
    }

    pub fn outside_repo() -> Self {
        Self::default()
    }
}
