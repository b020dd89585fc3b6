use thiserror::Error;

use weft_files::FilesError;
use weft_store::StoreError;
use weft_swap::{RouterError, SwapError};

/// Errors produced by the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already started")]
    AlreadyStarted,

    #[error("engine is not started")]
    NotStarted,

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Files(#[from] FilesError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
