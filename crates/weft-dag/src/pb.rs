//! Protobuf schemas for dag-pb nodes and UnixFS payloads.
//!
//! Hand-written prost messages; the wire format matches the schemas
//! below without a build-time codegen step.
//!
//! ```proto
//! // dag-pb
//! message PBLink {
//!     optional bytes  Hash  = 1;
//!     optional string Name  = 2;
//!     optional uint64 Tsize = 3;
//! }
//! message PBNode {
//!     repeated PBLink Links = 2;
//!     optional bytes  Data  = 1;
//! }
//!
//! // unixfs
//! message Data {
//!     enum DataType { Raw = 0; Directory = 1; File = 2; }
//!     required DataType Type       = 1;
//!     optional bytes    Data       = 2;
//!     optional uint64   filesize   = 3;
//!     repeated uint64   blocksizes = 4;
//! }
//! ```

use bytes::Bytes;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PbLink {
    #[prost(bytes = "bytes", optional, tag = "1")]
    pub hash: Option<Bytes>,
    #[prost(string, optional, tag = "2")]
    pub name: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub tsize: Option<u64>,
}

// Field order on the wire follows the tags; decoding accepts either
// order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PbNode {
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<PbLink>,
    #[prost(bytes = "bytes", optional, tag = "1")]
    pub data: Option<Bytes>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ::prost::Enumeration)]
#[repr(i32)]
pub enum PbDataType {
    Raw = 0,
    Directory = 1,
    File = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PbData {
    #[prost(enumeration = "PbDataType", required, tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "bytes", optional, tag = "2")]
    pub data: Option<Bytes>,
    #[prost(uint64, optional, tag = "3")]
    pub filesize: Option<u64>,
    #[prost(uint64, repeated, packed = "false", tag = "4")]
    pub blocksizes: Vec<u64>,
}
