//! # ctx-core
//!
//! Session tracking engine for ctx, shared by the daemon, the shell hook and
//! the report CLI.
//!
//! ## Design Principles
//!
//! - **The store is the only shared state**: processes never talk to each
//!   other; every invariant is kept by a SQLite transaction.
//! - **Synchronous**: plain threads and blocking I/O, no async runtime.
//! - **Graceful degradation**: unreadable files, git failures and a missing
//!   config degrade to "no information" instead of errors.
//! - **Collaborators are traits**: `Clock`, `GitContextResolver` and
//!   `WatchFactory` let tests drive the tracker deterministically.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ctx_core::{GitCli, GitContextResolver, Store, StorageConfig};
//!
//! let storage = StorageConfig::resolve()?;
//! let store = Store::open(storage.db_file())?;
//! if let Some(session) = store.current_session()? {
//!     println!("{} on {}", session.repo_name(), session.branch_label());
//! }
//! ```

pub mod aggregator;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod git;
pub mod ignore;
pub mod runner;
pub mod snippet;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod types;
pub mod watch;

pub use aggregator::{log_command, ActivityAggregator, CommandOutcome, FileOutcome};
pub use cancel::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CtxConfig;
pub use error::{CtxError, Result};
pub use filter::should_record;
pub use git::{GitCli, GitContextResolver};
pub use ignore::{IgnoreSet, DEFAULT_IGNORE_PATTERNS};
pub use runner::PollLoop;
pub use storage::{StorageConfig, CTX_HOME_ENV};
pub use store::{ShellCwd, Store, DEFAULT_BUSY_TIMEOUT};
pub use tracker::{ActiveSession, TickOutcome, Tracker, TrackerSettings};
pub use types::*;
pub use watch::{EventSink, NotifyWatchFactory, WatchFactory, WatchHandle};
