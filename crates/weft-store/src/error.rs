use thiserror::Error;

use weft_types::{Cid, TypeError};

/// Errors produced by block-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block not found: {0}")]
    NotFound(Cid),

    #[error("block of {size} bytes exceeds the {limit}-byte limit")]
    BlockTooLarge { size: u64, limit: u64 },

    #[error("stored bytes do not match digest for {0}")]
    CorruptBlock(Cid),

    #[error("operation cancelled")]
    Cancelled,

    #[error("exchange failed: {0}")]
    Exchange(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
