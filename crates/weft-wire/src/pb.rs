//! Protobuf schema shared by both protocol versions.
//!
//! ```proto
//! message Message {
//!     message Wantlist {
//!         message Entry {
//!             optional bytes block    = 1;  // multihash (1.0) or CID (1.1)
//!             optional int32 priority = 2;  // default 1
//!             optional bool  cancel   = 3;
//!         }
//!         repeated Entry entries = 1;
//!         optional bool  full    = 2;
//!     }
//!     message Block {
//!         optional bytes prefix = 1;  // (version, codec, hash algo, hash len)
//!         optional bytes data   = 2;
//!     }
//!     optional Wantlist wantlist = 1;
//!     repeated bytes    blocks   = 2;  // version 1.0
//!     repeated Block    payload  = 3;  // version 1.1
//! }
//! ```

use bytes::Bytes;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PbEntry {
    #[prost(bytes = "bytes", optional, tag = "1")]
    pub block: Option<Bytes>,
    #[prost(int32, optional, tag = "2")]
    pub priority: Option<i32>,
    #[prost(bool, optional, tag = "3")]
    pub cancel: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PbWantlist {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<PbEntry>,
    #[prost(bool, optional, tag = "2")]
    pub full: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PbBlock {
    #[prost(bytes = "bytes", optional, tag = "1")]
    pub prefix: Option<Bytes>,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub data: Option<Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PbMessage {
    #[prost(message, optional, tag = "1")]
    pub wantlist: Option<PbWantlist>,
    #[prost(bytes = "bytes", repeated, tag = "2")]
    pub blocks: Vec<Bytes>,
    #[prost(message, repeated, tag = "3")]
    pub payload: Vec<PbBlock>,
}
