use thiserror::Error;

use weft_dag::DagError;
use weft_store::StoreError;
use weft_types::Cid;

/// Errors produced by the file layer.
#[derive(Debug, Error)]
pub enum FilesError {
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("{0} is not a file")]
    NotAFile(Cid),

    #[error("seek to a negative position")]
    NegativeSeek,

    #[error("malformed file node: {0}")]
    InvalidNode(String),

    #[error(transparent)]
    Dag(#[from] DagError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type FilesResult<T> = Result<T, FilesError>;
