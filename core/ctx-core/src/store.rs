//! SQLite persistence shared by every ctx process.
//!
//! The daemon, shell hooks and report commands all open the same file with
//! no coordination beyond SQLite itself: WAL journaling, a busy timeout on
//! every connection, and `BEGIN IMMEDIATE` for the one multi-statement write
//! (`start_session`). Every other mutation is a single atomic statement.
//!
//! Each operation opens its own short-lived connection, so a `Store` is cheap
//! to clone and safe to use from the poll thread and the watch consumer at
//! the same time.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{CtxError, Result};
use crate::types::{CommandRecord, FileChangeRecord, Session};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const SESSION_COLUMNS: &str = "id, repo_path, branch, started_at, ended_at, last_active";

/// Last working directory reported by the shell hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellCwd {
    pub cwd: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Store {
    path: PathBuf,
    busy_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("busy_timeout", &self.busy_timeout)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Opens (creating if needed) the store at `path` with the system clock.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(path, DEFAULT_BUSY_TIMEOUT, Arc::new(SystemClock))
    }

    pub fn open_with(
        path: impl Into<PathBuf>,
        busy_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Self {
            path: path.into(),
            busy_timeout,
            clock,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// The open session, newest `last_active` first if more than one is open.
    pub fn current_session(&self) -> Result<Option<Session>> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions \
                     WHERE ended_at IS NULL \
                     ORDER BY last_active DESC, id DESC LIMIT 1"
                ),
                [],
                session_from_row,
            )
            .optional()
            .map_err(CtxError::store("query current session"))
        })
    }

    /// Closes every open session and opens a new one, atomically.
    pub fn start_session(&self, repo_path: &str, branch: Option<&str>) -> Result<i64> {
        let now = format_timestamp(self.now());
        let (id, closed) = self.with_connection(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(CtxError::store("begin start_session"))?;
            let closed = tx
                .execute(
                    "UPDATE sessions SET ended_at = ?1 WHERE ended_at IS NULL",
                    params![now],
                )
                .map_err(CtxError::store("close open sessions"))?;
            tx.execute(
                "INSERT INTO sessions (repo_path, branch, started_at, last_active) \
                 VALUES (?1, ?2, ?3, ?3)",
                params![repo_path, branch, now],
            )
            .map_err(CtxError::store("insert session"))?;
            let id = tx.last_insert_rowid();
            tx.commit().map_err(CtxError::store("commit start_session"))?;
            Ok((id, closed))
        })?;

        if closed > 1 {
            warn!(closed, "Closed more than one open session");
        }
        debug!(session_id = id, repo = %repo_path, branch = ?branch, closed, "Session started");
        Ok(id)
    }

    /// Closes the open session. Returns whether there was one.
    pub fn end_current_session(&self) -> Result<bool> {
        let now = format_timestamp(self.now());
        let closed = self.with_connection(|conn| {
            conn.execute(
                "UPDATE sessions SET ended_at = ?1 WHERE ended_at IS NULL",
                params![now],
            )
            .map_err(CtxError::store("end current session"))
        })?;
        Ok(closed > 0)
    }

    pub fn touch_session(&self, session_id: i64) -> Result<()> {
        let now = format_timestamp(self.now());
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE sessions SET last_active = ?1 WHERE id = ?2",
                params![now, session_id],
            )
            .map_err(CtxError::store("touch session"))?;
            Ok(())
        })
    }

    pub fn session(&self, session_id: i64) -> Result<Option<Session>> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![session_id],
                session_from_row,
            )
            .optional()
            .map_err(CtxError::store("query session"))
        })
    }

    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        self.query_sessions(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions \
                 ORDER BY started_at DESC, id DESC LIMIT ?1"
            ),
            params![limit as i64],
        )
    }

    /// Sessions whose branch contains `needle` (case-insensitive for ASCII).
    pub fn sessions_by_branch(&self, needle: &str, limit: usize) -> Result<Vec<Session>> {
        let pattern = format!("%{}%", escape_like(needle));
        self.query_sessions(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions \
                 WHERE branch LIKE ?1 ESCAPE '\\' \
                 ORDER BY started_at DESC, id DESC LIMIT ?2"
            ),
            params![pattern, limit as i64],
        )
    }

    /// Sessions started in `[from, to)`.
    pub fn sessions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Session>> {
        self.query_sessions(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions \
                 WHERE started_at >= ?1 AND started_at < ?2 \
                 ORDER BY started_at DESC, id DESC LIMIT ?3"
            ),
            params![format_timestamp(from), format_timestamp(to), limit as i64],
        )
    }

    /// Sessions started on the given calendar day in the local timezone.
    pub fn sessions_on(&self, date: NaiveDate, limit: usize) -> Result<Vec<Session>> {
        let from = local_midnight(date);
        let to = date
            .succ_opt()
            .map(local_midnight)
            .unwrap_or_else(|| from + chrono::Duration::days(1));
        self.sessions_between(from, to, limit)
    }

    pub fn count_open_sessions(&self) -> Result<usize> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sessions WHERE ended_at IS NULL",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count as usize)
            .map_err(CtxError::store("count open sessions"))
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // File changes
    // ─────────────────────────────────────────────────────────────────────

    /// Inserts the per-file aggregate or merges into it in one statement.
    pub fn upsert_file_change(
        &self,
        session_id: i64,
        filepath: &str,
        context: &str,
        delta_lines: i64,
    ) -> Result<()> {
        let now = format_timestamp(self.now());
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO file_changes (session_id, filepath, context, lines_changed, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(session_id, filepath) DO UPDATE SET \
                    context = excluded.context, \
                    lines_changed = file_changes.lines_changed + excluded.lines_changed, \
                    timestamp = excluded.timestamp",
                params![session_id, filepath, context, delta_lines, now],
            )
            .map_err(CtxError::store("upsert file change"))?;
            Ok(())
        })
    }

    pub fn file_change(&self, session_id: i64, filepath: &str) -> Result<Option<FileChangeRecord>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT session_id, filepath, context, lines_changed, timestamp \
                 FROM file_changes WHERE session_id = ?1 AND filepath = ?2",
                params![session_id, filepath],
                file_change_from_row,
            )
            .optional()
            .map_err(CtxError::store("query file change"))
        })
    }

    pub fn recent_file_changes(&self, session_id: i64, limit: usize) -> Result<Vec<FileChangeRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT session_id, filepath, context, lines_changed, timestamp \
                     FROM file_changes WHERE session_id = ?1 \
                     ORDER BY timestamp DESC, id DESC LIMIT ?2",
                )
                .map_err(CtxError::store("prepare file changes query"))?;
            let rows = stmt
                .query_map(params![session_id, limit as i64], file_change_from_row)
                .map_err(CtxError::store("read file change rows"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CtxError::store("decode file change row"))
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    pub fn append_command(
        &self,
        session_id: i64,
        command: &str,
        exit_code: i32,
        cwd: Option<&str>,
    ) -> Result<i64> {
        let now = format_timestamp(self.now());
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO commands (session_id, command, exit_code, cwd, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![session_id, command, exit_code, cwd, now],
            )
            .map_err(CtxError::store("append command"))?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn recent_commands(&self, session_id: i64, limit: usize) -> Result<Vec<CommandRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, command, COALESCE(exit_code, 0), cwd, timestamp \
                     FROM commands WHERE session_id = ?1 \
                     ORDER BY timestamp DESC, id DESC LIMIT ?2",
                )
                .map_err(CtxError::store("prepare commands query"))?;
            let rows = stmt
                .query_map(params![session_id, limit as i64], |row| {
                    Ok(CommandRecord {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        command: row.get(2)?,
                        exit_code: row.get(3)?,
                        cwd: row.get(4)?,
                        timestamp: timestamp_column(row, 5)?,
                    })
                })
                .map_err(CtxError::store("read command rows"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CtxError::store("decode command row"))
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shell cwd
    // ─────────────────────────────────────────────────────────────────────

    pub fn record_shell_cwd(&self, cwd: &str) -> Result<()> {
        let now = format_timestamp(self.now());
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO shell_cwd (id, cwd, updated_at) VALUES (1, ?1, ?2) \
                 ON CONFLICT(id) DO UPDATE SET \
                    cwd = excluded.cwd, \
                    updated_at = excluded.updated_at",
                params![cwd, now],
            )
            .map_err(CtxError::store("record shell cwd"))?;
            Ok(())
        })
    }

    pub fn last_shell_cwd(&self) -> Result<Option<ShellCwd>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT cwd, updated_at FROM shell_cwd WHERE id = 1",
                [],
                |row| {
                    Ok(ShellCwd {
                        cwd: row.get(0)?,
                        updated_at: timestamp_column(row, 1)?,
                    })
                },
            )
            .optional()
            .map_err(CtxError::store("query shell cwd"))
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Plumbing
    // ─────────────────────────────────────────────────────────────────────

    /// Creates tables and indexes. Safe to run repeatedly and from several
    /// processes at once.
    pub fn init_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN IMMEDIATE;
                 CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    repo_path TEXT NOT NULL,
                    branch TEXT,
                    started_at TEXT NOT NULL,
                    ended_at TEXT,
                    last_active TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS file_changes (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL REFERENCES sessions (id),
                    filepath TEXT NOT NULL,
                    context TEXT NOT NULL DEFAULT '',
                    lines_changed INTEGER NOT NULL DEFAULT 0,
                    timestamp TEXT NOT NULL,
                    UNIQUE (session_id, filepath)
                 );
                 CREATE TABLE IF NOT EXISTS commands (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL REFERENCES sessions (id),
                    command TEXT NOT NULL,
                    exit_code INTEGER,
                    cwd TEXT,
                    timestamp TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS shell_cwd (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    cwd TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_sessions_active
                    ON sessions (ended_at, last_active DESC);
                 CREATE INDEX IF NOT EXISTS idx_sessions_branch ON sessions (branch);
                 CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions (started_at);
                 CREATE INDEX IF NOT EXISTS idx_file_changes_recent
                    ON file_changes (session_id, timestamp DESC);
                 CREATE INDEX IF NOT EXISTS idx_commands_recent
                    ON commands (session_id, timestamp DESC);
                 COMMIT;",
            )
            .map_err(CtxError::store("initialize schema"))
        })
    }

    fn query_sessions(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Session>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(CtxError::store("prepare sessions query"))?;
            let rows = stmt
                .query_map(params, session_from_row)
                .map_err(CtxError::store("read session rows"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CtxError::store("decode session row"))
        })
    }

    fn with_connection<T>(&self, op: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.connect()?;
        op(&mut conn)
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent).map_err(CtxError::io("create store directory"))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn =
            Connection::open_with_flags(&self.path, flags).map_err(|source| CtxError::StoreOpen {
                path: self.path.clone(),
                source,
            })?;

        // Busy timeout first: switching to WAL needs a lock another process may hold.
        conn.busy_timeout(self.busy_timeout)
            .map_err(CtxError::store("set busy_timeout"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(CtxError::store("enable WAL"))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(CtxError::store("set synchronous"))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(CtxError::store("enable foreign keys"))?;
        Ok(conn)
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        repo_path: row.get(1)?,
        branch: row.get(2)?,
        started_at: timestamp_column(row, 3)?,
        ended_at: optional_timestamp_column(row, 4)?,
        last_active: timestamp_column(row, 5)?,
    })
}

fn file_change_from_row(row: &Row<'_>) -> rusqlite::Result<FileChangeRecord> {
    Ok(FileChangeRecord {
        session_id: row.get(0)?,
        filepath: row.get(1)?,
        context: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        lines_changed: row.get(3)?,
        timestamp: timestamp_column(row, 4)?,
    })
}

fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unparseable timestamp: {}", raw),
            )),
        )
    })
}

fn optional_timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(index)? {
        Some(_) => timestamp_column(row, index).map(Some),
        None => Ok(None),
    }
}

/// Fixed-width UTC so that text ordering in SQL matches time ordering.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and SQLite's `CURRENT_TIMESTAMP` layout (read as UTC).
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration as ChronoDuration;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap()
    }

    fn store_with_clock(temp_dir: &tempfile::TempDir) -> (Store, ManualClock) {
        let clock = ManualClock::new(start_time());
        let store = Store::open_with(
            temp_dir.path().join("sessions.db"),
            DEFAULT_BUSY_TIMEOUT,
            Arc::new(clock.clone()),
        )
        .expect("open store");
        (store, clock)
    }

    #[test]
    fn init_schema_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, _) = store_with_clock(&temp_dir);
        store.init_schema().expect("second init");
        Store::open(store.path()).expect("reopen");
        assert!(store.current_session().expect("current").is_none());
    }

    #[test]
    fn open_creates_missing_parent_directory() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("nested").join("ctx").join("sessions.db");
        Store::open(&path).expect("open store");
        assert!(path.exists());
    }

    #[test]
    fn start_session_closes_previous_one() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, clock) = store_with_clock(&temp_dir);

        let first = store.start_session("/repo", Some("main")).expect("first");
        clock.advance(ChronoDuration::minutes(5));
        let second = store.start_session("/repo", Some("feature")).expect("second");
        assert!(second > first);

        let first_row = store.session(first).expect("query").expect("first row");
        assert_eq!(first_row.ended_at, Some(start_time() + ChronoDuration::minutes(5)));

        let current = store.current_session().expect("current").expect("open session");
        assert_eq!(current.id, second);
        assert_eq!(current.branch.as_deref(), Some("feature"));
        assert_eq!(store.count_open_sessions().expect("count"), 1);
    }

    #[test]
    fn start_session_heals_multiple_open_sessions() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, _) = store_with_clock(&temp_dir);

        let conn = Connection::open(store.path()).expect("raw connection");
        for branch in ["a", "b", "c"] {
            conn.execute(
                "INSERT INTO sessions (repo_path, branch, started_at, last_active) \
                 VALUES ('/repo', ?1, '2026-01-30T00:00:00.000000Z', '2026-01-30T00:00:00.000000Z')",
                params![branch],
            )
            .expect("insert raw session");
        }
        assert_eq!(store.count_open_sessions().expect("count"), 3);

        store.start_session("/repo", Some("main")).expect("start");
        assert_eq!(store.count_open_sessions().expect("count"), 1);
    }

    #[test]
    fn current_session_prefers_latest_activity_when_duplicated() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, _) = store_with_clock(&temp_dir);

        let conn = Connection::open(store.path()).expect("raw connection");
        conn.execute_batch(
            "INSERT INTO sessions (repo_path, branch, started_at, last_active) \
                VALUES ('/old', 'main', '2026-01-30T00:00:00.000000Z', '2026-01-30T08:00:00.000000Z');
             INSERT INTO sessions (repo_path, branch, started_at, last_active) \
                VALUES ('/new', 'main', '2026-01-30T00:00:00.000000Z', '2026-01-30T09:00:00.000000Z');",
        )
        .expect("insert raw sessions");

        let current = store.current_session().expect("current").expect("open");
        assert_eq!(current.repo_path, "/new");
    }

    #[test]
    fn end_current_session_reports_whether_one_existed() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, _) = store_with_clock(&temp_dir);

        assert!(!store.end_current_session().expect("end with none"));
        store.start_session("/repo", None).expect("start");
        assert!(store.end_current_session().expect("end"));
        assert!(store.current_session().expect("current").is_none());
        assert!(!store.end_current_session().expect("end again"));
    }

    #[test]
    fn touch_session_moves_last_active() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, clock) = store_with_clock(&temp_dir);

        let id = store.start_session("/repo", Some("main")).expect("start");
        clock.advance(ChronoDuration::minutes(3));
        store.touch_session(id).expect("touch");

        let session = store.session(id).expect("query").expect("row");
        assert_eq!(session.started_at, start_time());
        assert_eq!(session.last_active, start_time() + ChronoDuration::minutes(3));
    }

    #[test]
    fn upsert_file_change_merges_per_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, clock) = store_with_clock(&temp_dir);
        let id = store.start_session("/repo", Some("main")).expect("start");

        store.upsert_file_change(id, "src/lib.rs", "first", 1).expect("first");
        clock.advance(ChronoDuration::seconds(10));
        store.upsert_file_change(id, "src/lib.rs", "second", 2).expect("second");

        let record = store.file_change(id, "src/lib.rs").expect("query").expect("row");
        assert_eq!(record.lines_changed, 3);
        assert_eq!(record.context, "second");
        assert_eq!(record.timestamp, start_time() + ChronoDuration::seconds(10));
        assert_eq!(store.recent_file_changes(id, 10).expect("list").len(), 1);
    }

    #[test]
    fn file_changes_are_scoped_to_their_session() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, _) = store_with_clock(&temp_dir);

        let first = store.start_session("/repo", Some("main")).expect("first");
        store.upsert_file_change(first, "README.md", "", 1).expect("upsert");
        let second = store.start_session("/repo", Some("feature")).expect("second");
        store.upsert_file_change(second, "README.md", "", 1).expect("upsert");

        assert_eq!(
            store.file_change(first, "README.md").expect("query").expect("row").lines_changed,
            1
        );
        assert_eq!(
            store.file_change(second, "README.md").expect("query").expect("row").lines_changed,
            1
        );
    }

    #[test]
    fn recent_reads_are_newest_first_and_bounded() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, clock) = store_with_clock(&temp_dir);
        let id = store.start_session("/repo", Some("main")).expect("start");

        for name in ["a.rs", "b.rs", "c.rs"] {
            clock.advance(ChronoDuration::seconds(1));
            store.upsert_file_change(id, name, "", 1).expect("upsert");
            store
                .append_command(id, &format!("cargo test {name}"), 0, Some("/repo"))
                .expect("append");
        }

        let files: Vec<_> = store
            .recent_file_changes(id, 2)
            .expect("files")
            .into_iter()
            .map(|record| record.filepath)
            .collect();
        assert_eq!(files, vec!["c.rs", "b.rs"]);

        let commands: Vec<_> = store
            .recent_commands(id, 10)
            .expect("commands")
            .into_iter()
            .map(|record| record.command)
            .collect();
        assert_eq!(
            commands,
            vec!["cargo test c.rs", "cargo test b.rs", "cargo test a.rs"]
        );
    }

    #[test]
    fn commands_are_never_merged() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, _) = store_with_clock(&temp_dir);
        let id = store.start_session("/repo", Some("main")).expect("start");

        store.append_command(id, "make", 2, Some("/repo")).expect("first");
        store.append_command(id, "make", 0, Some("/repo")).expect("second");

        let commands = store.recent_commands(id, 10).expect("commands");
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].exit_code, 0);
        assert_eq!(commands[1].exit_code, 2);
    }

    #[test]
    fn sessions_by_branch_matches_substrings_literally() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, clock) = store_with_clock(&temp_dir);

        for branch in [Some("feature/login"), Some("FEATURE_x"), Some("main"), None] {
            clock.advance(ChronoDuration::minutes(1));
            store.start_session("/repo", branch).expect("start");
        }

        let matched: Vec<_> = store
            .sessions_by_branch("feature", 10)
            .expect("by branch")
            .into_iter()
            .filter_map(|s| s.branch)
            .collect();
        assert_eq!(matched, vec!["FEATURE_x", "feature/login"]);

        // `_` is literal, not a single-character wildcard.
        let underscored = store.sessions_by_branch("e_x", 10).expect("by branch");
        assert_eq!(underscored.len(), 1);
    }

    #[test]
    fn sessions_between_filters_on_start_time() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, clock) = store_with_clock(&temp_dir);

        store.start_session("/repo", Some("day-one")).expect("start");
        clock.advance(ChronoDuration::days(1));
        store.start_session("/repo", Some("day-two")).expect("start");

        let day_one = store
            .sessions_between(start_time(), start_time() + ChronoDuration::hours(12), 10)
            .expect("between");
        assert_eq!(day_one.len(), 1);
        assert_eq!(day_one[0].branch.as_deref(), Some("day-one"));
        assert_eq!(store.recent_sessions(10).expect("recent").len(), 2);
        assert_eq!(store.recent_sessions(1).expect("recent")[0].branch.as_deref(), Some("day-two"));
    }

    #[test]
    fn shell_cwd_keeps_only_the_latest() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, _) = store_with_clock(&temp_dir);

        assert!(store.last_shell_cwd().expect("empty").is_none());
        store.record_shell_cwd("/one").expect("record");
        store.record_shell_cwd("/two").expect("record");
        assert_eq!(store.last_shell_cwd().expect("query").expect("row").cwd, "/two");
    }

    #[test]
    fn parses_legacy_sqlite_timestamps() {
        let parsed = parse_timestamp("2026-01-31 09:00:00").expect("legacy");
        assert_eq!(parsed, start_time());
        let round_trip = parse_timestamp(&format_timestamp(start_time())).expect("rfc3339");
        assert_eq!(round_trip, start_time());
    }
}
