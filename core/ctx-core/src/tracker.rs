//! Session state machine.
//!
//! The tracker decides session boundaries from the git context it is fed on
//! every tick and the time since the last recorded activity. The store is the
//! authority on which session is open; the tracker's cached copy is
//! reconciled against it at the start of each tick, so another process
//! ending the session (`ctx new`) or a daemon restart are both picked up
//! within one poll interval.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::aggregator::{ActivityAggregator, CommandOutcome, FileOutcome};
use crate::config::CtxConfig;
use crate::error::Result;
use crate::git::GitContextResolver;
use crate::store::Store;
use crate::types::{GitContext, Session};
use crate::watch::{EventSink, WatchFactory, WatchHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub inactivity_threshold: chrono::Duration,
    pub watch_stop_timeout: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            inactivity_threshold: chrono::Duration::minutes(45),
            watch_stop_timeout: Duration::from_secs(2),
        }
    }
}

impl TrackerSettings {
    pub fn from_config(config: &CtxConfig) -> Self {
        Self {
            inactivity_threshold: config.inactivity_threshold(),
            watch_stop_timeout: config.watch_stop_timeout(),
        }
    }
}

/// The tracker's view of the open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub id: i64,
    pub repo: PathBuf,
    pub branch: Option<String>,
    pub last_active: DateTime<Utc>,
}

impl From<Session> for ActiveSession {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            repo: PathBuf::from(session.repo_path),
            branch: session.branch,
            last_active: session.last_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not inside a working tree; the watch is stopped, the session kept.
    OutsideRepo,
    Started {
        session_id: i64,
        superseded: Option<i64>,
    },
    Continued {
        session_id: i64,
    },
}

/// Session id and root the watch callbacks attribute events to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    session_id: i64,
    repo_root: PathBuf,
}

type SessionSlot = Arc<RwLock<Option<Binding>>>;

pub struct Tracker {
    store: Store,
    aggregator: Arc<ActivityAggregator>,
    watch_factory: Box<dyn WatchFactory>,
    settings: TrackerSettings,
    active: Option<ActiveSession>,
    slot: SessionSlot,
    watch: Option<Box<dyn WatchHandle>>,
}

impl Tracker {
    pub fn new(
        aggregator: ActivityAggregator,
        watch_factory: Box<dyn WatchFactory>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            store: aggregator.store().clone(),
            aggregator: Arc::new(aggregator),
            watch_factory,
            settings,
            active: None,
            slot: Arc::new(RwLock::new(None)),
            watch: None,
        }
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    pub fn tick(&mut self, context: &GitContext) -> Result<TickOutcome> {
        self.reconcile()?;

        let Some(repo) = context.repo.as_ref() else {
            if self.watch.is_some() {
                debug!("Outside any repository, pausing watch");
            }
            self.stop_watch();
            return Ok(TickOutcome::OutsideRepo);
        };

        let now = self.store.now();
        let needs_new_session = match &self.active {
            None => true,
            Some(active) => {
                active.repo != *repo
                    || active.branch != context.branch
                    || now - active.last_active > self.settings.inactivity_threshold
            }
        };

        let outcome = if needs_new_session {
            let superseded = self.active.as_ref().map(|active| active.id);
            self.stop_watch();
            self.bind(None);

            let session_id = self
                .store
                .start_session(&repo.to_string_lossy(), context.branch.as_deref())?;
            self.active = Some(ActiveSession {
                id: session_id,
                repo: repo.clone(),
                branch: context.branch.clone(),
                last_active: now,
            });
            self.bind(Some(Binding {
                session_id,
                repo_root: repo.clone(),
            }));

            info!(
                session_id,
                superseded = ?superseded,
                repo = %repo.display(),
                branch = context.branch.as_deref().unwrap_or("detached"),
                "Session started"
            );
            TickOutcome::Started {
                session_id,
                superseded,
            }
        } else {
            let session_id = self.active.as_ref().map(|active| active.id).unwrap_or_default();
            TickOutcome::Continued { session_id }
        };

        if self.watch.is_none() {
            self.start_watch(repo);
        }

        if let Some(active) = self.active.as_mut() {
            self.store.touch_session(active.id)?;
            active.last_active = now;
        }
        Ok(outcome)
    }

    /// Records a modification against the open session, dropping it when
    /// there is none.
    pub fn on_file_event(&self, path: &Path) -> Result<FileOutcome> {
        deliver_file_event(&self.aggregator, &self.slot, path)
    }

    pub fn on_command(
        &self,
        command: &str,
        exit_code: i32,
        cwd: &Path,
        resolver: &dyn GitContextResolver,
    ) -> Result<CommandOutcome> {
        let Some(binding) = read_binding(&self.slot) else {
            return Ok(CommandOutcome::NoSession);
        };
        self.aggregator
            .on_command(binding.session_id, command, exit_code, cwd, resolver)
    }

    /// Closes the open session without opening a replacement.
    pub fn end_session(&mut self) -> Result<bool> {
        self.stop_watch();
        self.bind(None);
        self.active = None;
        let ended = self.store.end_current_session()?;
        if ended {
            info!("Session ended");
        }
        Ok(ended)
    }

    /// Stops the watch. The session stays open for the next tracker to adopt.
    pub fn shutdown(&mut self) {
        self.stop_watch();
        self.bind(None);
    }

    fn reconcile(&mut self) -> Result<()> {
        let stored = self.store.current_session()?;
        let cached_id = self.active.as_ref().map(|active| active.id);

        match (cached_id, stored) {
            (Some(id), Some(stored)) if stored.id == id => {
                if let Some(active) = self.active.as_mut() {
                    active.last_active = active.last_active.max(stored.last_active);
                }
            }
            (Some(id), _) => {
                info!(session_id = id, "Session closed elsewhere, dropping cached state");
                self.stop_watch();
                self.bind(None);
                self.active = None;
            }
            (None, Some(stored)) => {
                debug!(session_id = stored.id, repo = %stored.repo_path, "Adopting open session");
                let active = ActiveSession::from(stored);
                self.bind(Some(Binding {
                    session_id: active.id,
                    repo_root: active.repo.clone(),
                }));
                self.active = Some(active);
            }
            (None, None) => {}
        }
        Ok(())
    }

    fn start_watch(&mut self, repo: &Path) {
        let Some(binding) = read_binding(&self.slot) else {
            return;
        };
        let sink = file_event_sink(Arc::clone(&self.aggregator), Arc::clone(&self.slot), binding);
        match self.watch_factory.start(repo, sink) {
            Ok(handle) => self.watch = Some(handle),
            Err(err) => warn!(error = %err, repo = %repo.display(), "Failed to start watch"),
        }
    }

    fn stop_watch(&mut self) {
        if let Some(handle) = self.watch.take() {
            handle.stop(self.settings.watch_stop_timeout);
        }
    }

    fn bind(&self, binding: Option<Binding>) {
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = binding;
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.stop_watch();
    }
}

fn read_binding(slot: &SessionSlot) -> Option<Binding> {
    slot.read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn deliver_file_event(
    aggregator: &ActivityAggregator,
    slot: &SessionSlot,
    path: &Path,
) -> Result<FileOutcome> {
    match read_binding(slot) {
        Some(binding) => aggregator.on_file_modified(binding.session_id, &binding.repo_root, path),
        None => Ok(FileOutcome::NoSession),
    }
}

/// Events reach the store only while `bound` is still the tracker's binding.
/// A watch that drains after its session was superseded drops what is left.
fn deliver_bound_event(
    aggregator: &ActivityAggregator,
    slot: &SessionSlot,
    bound: &Binding,
    path: &Path,
) -> Result<FileOutcome> {
    if read_binding(slot).as_ref() != Some(bound) {
        debug!(
            session_id = bound.session_id,
            path = %path.display(),
            "Dropping event from a superseded watch"
        );
        return Ok(FileOutcome::NoSession);
    }
    aggregator.on_file_modified(bound.session_id, &bound.repo_root, path)
}

fn file_event_sink(
    aggregator: Arc<ActivityAggregator>,
    slot: SessionSlot,
    bound: Binding,
) -> EventSink {
    Arc::new(move |path: &Path| {
        if let Err(err) = deliver_bound_event(&aggregator, &slot, &bound, path) {
            warn!(error = %err, path = %path.display(), "Failed to record file change");
        }
    })
}
