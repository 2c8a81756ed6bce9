//! The daemon's poll loop.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::git::GitContextResolver;
use crate::store::Store;
use crate::tracker::Tracker;

pub struct PollLoop<'a> {
    pub tracker: Tracker,
    pub store: Store,
    pub resolver: &'a dyn GitContextResolver,
    pub interval: Duration,
    /// Used when no shell has reported a working directory yet.
    pub fallback_cwd: PathBuf,
}

impl PollLoop<'_> {
    /// Ticks until `token` is cancelled, then stops the watch.
    ///
    /// A failing tick is logged and retried on the next interval.
    pub fn run(mut self, token: &CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Tracker running");

        while !token.is_cancelled() {
            let cwd = self.tracked_cwd();
            let context = self.resolver.resolve(&cwd);
            match self.tracker.tick(&context) {
                Ok(outcome) => debug!(cwd = %cwd.display(), ?outcome, "Tick"),
                Err(err) => warn!(error = %err, cwd = %cwd.display(), "Tick failed"),
            }

            if token.wait_timeout(self.interval) {
                break;
            }
        }

        self.tracker.shutdown();
        info!("Tracker stopped");
    }

    fn tracked_cwd(&self) -> PathBuf {
        match self.store.last_shell_cwd() {
            Ok(Some(shell)) => PathBuf::from(shell.cwd),
            Ok(None) => self.fallback_cwd.clone(),
            Err(err) => {
                warn!(error = %err, "Failed to read shell cwd");
                self.fallback_cwd.clone()
            }
        }
    }
}
