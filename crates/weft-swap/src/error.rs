use thiserror::Error;

use weft_store::StoreError;
use weft_types::{PeerId, TypeError};

/// Errors produced by the block-exchange engine.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("exchange engine is not started")]
    NotStarted,

    #[error("exchange engine is already started")]
    AlreadyStarted,

    #[error("could not reach peer {peer}: {reason}")]
    Dial { peer: PeerId, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SwapResult<T> = Result<T, SwapError>;
