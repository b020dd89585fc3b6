//! The bitswap wire protocols.
//!
//! Two compatible variants of one framed request/response protocol:
//!
//! - `/ipfs/bitswap/1.0.0` — want entries carry bare multihash bytes
//!   and blocks travel as flat byte strings; receivers rehash to
//!   recover the CID. One message per inbound stream.
//! - `/ipfs/bitswap/1.1.0` — want entries carry full CID bytes and
//!   blocks carry a [`CidPrefix`] describing version, codec, and hash
//!   so receivers know how to name them. The receive loop runs until
//!   the stream closes.
//!
//! Messages are varint length-delimited protobuf records
//! ([`pb::PbMessage`]); both variants share the schema and differ only
//! in which fields they populate.

pub mod error;
pub mod framing;
pub mod message;
pub mod pb;
pub mod prefix;
pub mod protocol;

pub use error::{WireError, WireResult};
pub use message::{ReceivedBlock, SwapMessage};
pub use prefix::CidPrefix;
pub use protocol::{BitswapProtocol, WireVersion, PROTOCOL_ID_V1_0, PROTOCOL_ID_V1_1};
