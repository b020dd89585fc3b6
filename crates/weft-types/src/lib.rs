//! Foundation types for weft.
//!
//! This crate provides the content-addressing primitives used throughout
//! the weft system. Every other weft crate depends on `weft-types`.
//!
//! # Key Types
//!
//! - [`Multihash`] — `(algorithm, digest)` content hash with a varint
//!   binary form
//! - [`HashAlgorithm`] — the supported hash family (identity, sha2-256,
//!   sha2-512)
//! - [`Cid`] — self-describing content identifier (v0 and v1, base58btc
//!   and base32 text forms)
//! - [`DataBlock`] — a content-addressed chunk of bytes
//! - [`PeerId`] — opaque identifier for a remote peer

pub mod block;
pub mod cid;
pub mod error;
pub mod multihash;
pub mod peer;

pub use block::DataBlock;
pub use cid::{Cid, CidVersion, Codec, Encoding};
pub use error::TypeError;
pub use multihash::{HashAlgorithm, Multihash};
pub use peer::PeerId;
