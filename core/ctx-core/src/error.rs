//! Error types for ctx-core operations.

use std::path::PathBuf;

/// All errors that can occur in ctx-core operations.
///
/// Transient failures (unreadable files, git timeouts) never reach this type;
/// they degrade to "no information" at the call site. What remains is either
/// fatal at startup (the store cannot be opened) or non-fatal for one tick.
#[derive(Debug, thiserror::Error)]
pub enum CtxError {
    // ─────────────────────────────────────────────────────────────────────
    // Store Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to open session store at {path}: {source}")]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store error: {context}: {source}")]
    Store {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl CtxError {
    pub(crate) fn store(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> Self {
        let context = context.into();
        move |source| CtxError::Store { context, source }
    }

    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| CtxError::Io { context, source }
    }
}

/// Convenience type alias for Results using CtxError.
pub type Result<T> = std::result::Result<T, CtxError>;

impl From<CtxError> for String {
    fn from(err: CtxError) -> String {
        err.to_string()
    }
}
