//! File logging for the hook.
//!
//! The hook runs inside the user's prompt, so it must never write to the
//! terminal. Logs go to `<ctx home>/logs/ctx-hook.log`; if that file cannot be
//! opened the hook runs without logging.

use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use ctx_core::StorageConfig;

const LOG_FILE: &str = "ctx-hook.log";

/// Installs the subscriber. Keep the guard alive until exit so buffered
/// lines are flushed.
pub fn init() -> Option<WorkerGuard> {
    let storage = StorageConfig::resolve().ok()?;
    let logs_dir = storage.logs_dir();
    fs_err::create_dir_all(&logs_dir).ok()?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(&logs_dir)
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let debug_enabled = env::var("CTX_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}
