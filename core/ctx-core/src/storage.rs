//! Storage path management for ctx.
//!
//! `StorageConfig` is the single place that decides where ctx keeps its
//! data. Production code uses `StorageConfig::resolve()`, which honours the
//! `CTX_HOME` override and otherwise points at `~/.ctx/`. Tests use
//! `StorageConfig::with_root(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

use crate::error::{CtxError, Result};

/// Environment variable that relocates the whole ctx data directory.
pub const CTX_HOME_ENV: &str = "CTX_HOME";

const DB_FILE: &str = "sessions.db";
const CONFIG_FILE: &str = "config.toml";
const LOGS_DIR: &str = "logs";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the data root: `$CTX_HOME` if set and non-empty, else `~/.ctx`.
    pub fn resolve() -> Result<Self> {
        if let Some(root) = std::env::var_os(CTX_HOME_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(CtxError::HomeNotFound)?;
        Ok(Self::with_root(home.join(".ctx")))
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The shared SQLite store used by every ctx process.
    pub fn db_file(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }
}
