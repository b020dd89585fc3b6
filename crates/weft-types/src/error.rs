use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown hash algorithm: {0}")]
    UnknownHashAlgorithm(String),

    #[error("unknown multihash code: {0:#x}")]
    UnknownHashCode(u64),

    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    #[error("unknown codec code: {0:#x}")]
    UnknownCodecCode(u64),

    #[error("invalid digest length for {algorithm}: expected {expected}, got {actual}")]
    InvalidDigestLength {
        algorithm: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid cid: {0}")]
    InvalidCid(String),

    #[error("invalid multihash: {0}")]
    InvalidMultihash(String),

    #[error("digest does not match content for {0}")]
    DigestMismatch(String),
}
