//! Shell CWD tracking, called by shell precmd hooks.
//!
//! ```bash
//! ctx-hook cwd "$PWD"
//! ```
//!
//! The daemon resolves git context for the last reported directory on every
//! tick.

use ctx_core::{CtxConfig, StorageConfig, Store, SystemClock};
use std::sync::Arc;

use crate::error::HookError;

pub fn run(path: &str) -> Result<(), HookError> {
    let storage = StorageConfig::resolve()?;
    let busy_timeout = CtxConfig::load(&storage.config_file())
        .map(|config| config.busy_timeout())
        .unwrap_or(ctx_core::DEFAULT_BUSY_TIMEOUT);
    let store = Store::open_with(storage.db_file(), busy_timeout, Arc::new(SystemClock))?;
    store.record_shell_cwd(&normalize_path(path))?;
    Ok(())
}

fn normalize_path(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        path.trim_end_matches('/').to_string()
    }
}
