//! Folds file-change and command events into the active session's records.
//!
//! Every write here is its own store statement, so the watch consumer and the
//! poll thread can call in concurrently without any in-process locking.

use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::filter::should_record;
use crate::git::GitContextResolver;
use crate::ignore::IgnoreSet;
use crate::snippet::read_tail;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Recorded { filepath: String },
    Ignored,
    /// No session was active to attribute the change to.
    NoSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Recorded(i64),
    Filtered,
    NoSession,
    OutsideRepo,
}

impl CommandOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, CommandOutcome::Recorded(_))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            CommandOutcome::Recorded(_) => "logged",
            CommandOutcome::Filtered => "skipped: filtered",
            CommandOutcome::NoSession => "skipped: no active session",
            CommandOutcome::OutsideRepo => "skipped: not in a git repository",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivityAggregator {
    store: Store,
    ignore: IgnoreSet,
    context_lines: usize,
}

impl ActivityAggregator {
    pub fn new(store: Store, ignore: IgnoreSet, context_lines: usize) -> Self {
        Self {
            store,
            ignore,
            context_lines,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Records one modification of `path` against `session_id`.
    ///
    /// Each event counts as one edit; the counter measures activity, not
    /// diff size.
    pub fn on_file_modified(
        &self,
        session_id: i64,
        repo_root: &Path,
        path: &Path,
    ) -> Result<FileOutcome> {
        if path.is_dir() {
            return Ok(FileOutcome::Ignored);
        }

        let relative = path.strip_prefix(repo_root).unwrap_or(path);
        if self.ignore.is_ignored(relative) {
            return Ok(FileOutcome::Ignored);
        }

        let filepath = relative.to_string_lossy().into_owned();
        let context = read_tail(path, self.context_lines);
        self.store
            .upsert_file_change(session_id, &filepath, &context, 1)?;
        self.store.touch_session(session_id)?;

        debug!(session_id, filepath = %filepath, "File change recorded");
        Ok(FileOutcome::Recorded { filepath })
    }

    pub fn on_command(
        &self,
        session_id: i64,
        command: &str,
        exit_code: i32,
        cwd: &Path,
        resolver: &dyn GitContextResolver,
    ) -> Result<CommandOutcome> {
        record_command(&self.store, resolver, session_id, command, exit_code, cwd)
    }
}

/// Command-logging entry point used by the shell hook.
///
/// Attributes the command to whichever session is open in the store, which
/// may belong to a different repository than `cwd`.
pub fn log_command(
    store: &Store,
    resolver: &dyn GitContextResolver,
    command: &str,
    exit_code: i32,
    cwd: &Path,
) -> Result<CommandOutcome> {
    if !should_record(command) {
        return Ok(CommandOutcome::Filtered);
    }
    let Some(session) = store.current_session()? else {
        return Ok(CommandOutcome::NoSession);
    };
    record_command(store, resolver, session.id, command, exit_code, cwd)
}

fn record_command(
    store: &Store,
    resolver: &dyn GitContextResolver,
    session_id: i64,
    command: &str,
    exit_code: i32,
    cwd: &Path,
) -> Result<CommandOutcome> {
    if !should_record(command) {
        return Ok(CommandOutcome::Filtered);
    }
    if resolver.resolve(cwd).repo.is_none() {
        return Ok(CommandOutcome::OutsideRepo);
    }

    let cwd = cwd.to_string_lossy();
    let id = store.append_command(session_id, command, exit_code, Some(cwd.as_ref()))?;
    store.touch_session(session_id)?;

    debug!(session_id, command_id = id, exit_code, "Command recorded");
    Ok(CommandOutcome::Recorded(id))
}
