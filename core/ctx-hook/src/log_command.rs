//! Command logging, called by shell precmd hooks after every command.
//!
//! ```bash
//! ctx-hook log-command "cargo test" 0
//! ```
//!
//! Filtered commands return before the store is opened.

use std::env;
use std::sync::Arc;
use tracing::{debug, warn};

use ctx_core::{
    should_record, CommandOutcome, CtxConfig, GitCli, StorageConfig, Store, SystemClock,
};

use crate::error::HookError;

pub fn run(command: &str, exit_code: &str) -> Result<CommandOutcome, HookError> {
    if !should_record(command) {
        return Ok(CommandOutcome::Filtered);
    }
    let exit_code = parse_exit_code(exit_code);

    let storage = StorageConfig::resolve()?;
    let config = CtxConfig::load(&storage.config_file()).unwrap_or_else(|err| {
        warn!(error = %err, "Failed to load config; using defaults");
        CtxConfig::default()
    });
    let store = Store::open_with(
        storage.db_file(),
        config.busy_timeout(),
        Arc::new(SystemClock),
    )?;
    let cwd = env::current_dir()?;
    let resolver = GitCli::new(config.git_timeout());

    let outcome = ctx_core::log_command(&store, &resolver, command, exit_code, &cwd)?;
    debug!(outcome = outcome.describe(), exit_code, cwd = %cwd.display(), "log-command");
    Ok(outcome)
}

/// Shells occasionally pass an empty or non-numeric status; count it as a failure.
fn parse_exit_code(raw: &str) -> i32 {
    raw.trim().parse().unwrap_or(1)
}
