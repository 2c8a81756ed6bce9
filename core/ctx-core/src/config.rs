//! Tunables loaded from `config.toml` in the ctx data directory.
//!
//! Every field has a default, so a missing file (the common case) or a
//! partial one both work. A malformed file is reported to the caller, which
//! decides whether to warn and fall back.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CtxError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtxConfig {
    /// Seconds between git context checks.
    pub poll_interval_secs: u64,
    /// Idle gap after which the same context gets a fresh session.
    pub inactivity_threshold_mins: u64,
    /// Trailing lines captured as the context snippet of a modified file.
    pub context_lines: usize,
    /// Upper bound on waiting for in-flight watch callbacks when a watch stops.
    pub watch_stop_timeout_ms: u64,
    /// Upper bound on each git subprocess.
    pub git_timeout_ms: u64,
    /// SQLite busy timeout for every store connection.
    pub busy_timeout_ms: u64,
    /// Capacity of the queue between the watch backend and the aggregator.
    pub event_queue_capacity: usize,
    /// Extra ignore patterns, same syntax as the built-in set.
    pub ignore: Vec<String>,
}

impl Default for CtxConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            inactivity_threshold_mins: 45,
            context_lines: 6,
            watch_stop_timeout_ms: 2000,
            git_timeout_ms: 2000,
            busy_timeout_ms: 5000,
            event_queue_capacity: 1024,
            ignore: Vec::new(),
        }
    }
}

impl CtxConfig {
    /// Loads the config file, returning defaults if it doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(CtxError::Io {
                    context: format!("reading {}", path.display()),
                    source: err,
                })
            }
        };
        toml::from_str(&contents).map_err(|err| CtxError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn inactivity_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.inactivity_threshold_mins as i64)
    }

    pub fn watch_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.watch_stop_timeout_ms)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_millis(self.git_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
