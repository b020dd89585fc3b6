use thiserror::Error;

use weft_swap::SwapError;
use weft_types::TypeError;

/// Errors produced on a wire stream.
#[derive(Debug, Error)]
pub enum WireError {
    /// Malformed frame or message; closes the offending stream only.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type WireResult<T> = Result<T, WireError>;

impl From<WireError> for SwapError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Protocol(reason) => SwapError::Protocol(reason),
            WireError::Type(e) => SwapError::Type(e),
            WireError::Io(e) => SwapError::Io(e),
        }
    }
}
