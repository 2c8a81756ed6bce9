use thiserror::Error;

use ctx_core::CtxError;

#[derive(Error, Debug)]
pub enum HookError {
    #[error(transparent)]
    Ctx(#[from] CtxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
