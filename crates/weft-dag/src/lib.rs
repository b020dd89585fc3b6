//! Merkle DAG nodes and the UnixFS metadata they carry.
//!
//! A [`DagNode`] is a block payload plus named, sized links to other
//! blocks. Its wire form is a protobuf record (`PBNode`/`PBLink`), so a
//! node's CID is a deterministic function of its serialized bytes.
//! File-system structure rides *inside* the node payload as a
//! [`UnixFsData`] message: a type tag (`Raw`/`Directory`/`File`),
//! optional file size, per-child chunk sizes, and optionally the leaf
//! bytes themselves.

pub mod error;
pub mod node;
mod pb;
pub mod unixfs;

pub use error::DagError;
pub use node::{empty_directory, empty_directory_cid, empty_node, empty_node_cid, DagLink, DagNode};
pub use unixfs::{UnixFsData, UnixFsType};
