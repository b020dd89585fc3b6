use thiserror::Error;

use weft_types::TypeError;

/// Errors produced while encoding or decoding DAG structures.
#[derive(Debug, Error)]
pub enum DagError {
    #[error("malformed node: {0}")]
    Decode(String),

    #[error("malformed link: {0}")]
    InvalidLink(String),

    #[error("malformed unixfs payload: {0}")]
    InvalidUnixFs(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

pub type DagResult<T> = Result<T, DagError>;
