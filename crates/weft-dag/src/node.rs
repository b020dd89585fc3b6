//! DAG nodes: a payload plus named, sized links.

use std::sync::OnceLock;

use bytes::Bytes;
use prost::Message;

use weft_types::{Cid, Codec, HashAlgorithm};

use crate::error::{DagError, DagResult};
use crate::pb::{PbLink, PbNode};
use crate::unixfs::UnixFsData;

/// A link from a DAG node to another block.
///
/// `size` is the content size of the linked sub-DAG (for file children,
/// the number of file bytes it covers), as recorded by the builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DagLink {
    pub name: String,
    pub id: Cid,
    pub size: u64,
}

impl DagLink {
    pub fn new(name: impl Into<String>, id: Cid, size: u64) -> Self {
        Self {
            name: name.into(),
            id,
            size,
        }
    }
}

/// An in-memory Merkle DAG node.
///
/// Serialization is protobuf-compatible and deterministic; link order
/// is preserved exactly as supplied, and a node's CID is computed over
/// its serialized bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DagNode {
    data: Bytes,
    links: Vec<DagLink>,
}

impl DagNode {
    pub fn new(data: Bytes, links: Vec<DagLink>) -> Self {
        Self { data, links }
    }

    /// A node carrying a UnixFS payload.
    pub fn with_unixfs(payload: &UnixFsData, links: Vec<DagLink>) -> Self {
        Self::new(payload.to_bytes(), links)
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn links(&self) -> &[DagLink] {
        &self.links
    }

    fn to_pb(&self) -> PbNode {
        PbNode {
            links: self
                .links
                .iter()
                .map(|l| PbLink {
                    hash: Some(l.id.to_bytes()),
                    name: Some(l.name.clone()),
                    tsize: Some(l.size),
                })
                .collect(),
            data: if self.data.is_empty() {
                None
            } else {
                Some(self.data.clone())
            },
        }
    }

    /// Serialized wire form.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_pb().encode_to_vec())
    }

    /// Serialized length in bytes.
    pub fn size(&self) -> u64 {
        self.to_pb().encoded_len() as u64
    }

    pub fn from_bytes(data: &[u8]) -> DagResult<Self> {
        let pb = PbNode::decode(data).map_err(|e| DagError::Decode(e.to_string()))?;
        let links = pb
            .links
            .into_iter()
            .map(|l| {
                let hash = l
                    .hash
                    .ok_or_else(|| DagError::InvalidLink("missing hash".into()))?;
                Ok(DagLink {
                    name: l.name.unwrap_or_default(),
                    id: Cid::from_bytes(&hash)?,
                    size: l.tsize.unwrap_or(0),
                })
            })
            .collect::<DagResult<Vec<_>>>()?;
        Ok(Self {
            data: pb.data.unwrap_or_default(),
            links,
        })
    }

    /// The node's CID under `algorithm`: v0 for sha2-256 (dag-pb),
    /// v1 otherwise.
    pub fn cid(&self, algorithm: HashAlgorithm) -> Cid {
        Cid::for_content(Codec::DagPb, algorithm, &self.to_bytes())
    }

    /// Parse the payload as UnixFS metadata.
    pub fn unixfs(&self) -> DagResult<UnixFsData> {
        UnixFsData::from_bytes(&self.data)
    }
}

static EMPTY_NODE: OnceLock<(DagNode, Cid)> = OnceLock::new();
static EMPTY_DIRECTORY: OnceLock<(DagNode, Cid)> = OnceLock::new();

fn empty_node_entry() -> &'static (DagNode, Cid) {
    EMPTY_NODE.get_or_init(|| {
        let node = DagNode::new(Bytes::new(), Vec::new());
        let cid = node.cid(HashAlgorithm::Sha2_256);
        (node, cid)
    })
}

fn empty_directory_entry() -> &'static (DagNode, Cid) {
    EMPTY_DIRECTORY.get_or_init(|| {
        let node = DagNode::with_unixfs(&UnixFsData::directory(), Vec::new());
        let cid = node.cid(HashAlgorithm::Sha2_256);
        (node, cid)
    })
}

/// The empty DAG node sentinel. Never persisted; stores synthesize it.
pub fn empty_node() -> &'static DagNode {
    &empty_node_entry().0
}

pub fn empty_node_cid() -> &'static Cid {
    &empty_node_entry().1
}

/// The empty UnixFS directory sentinel. Never persisted.
pub fn empty_directory() -> &'static DagNode {
    &empty_directory_entry().0
}

pub fn empty_directory_cid() -> &'static Cid {
    &empty_directory_entry().1
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::CidVersion;

    fn leaf_cid(data: &[u8]) -> Cid {
        Cid::for_content(Codec::Raw, HashAlgorithm::Sha2_256, data)
    }

    #[test]
    fn roundtrip_node_with_links() {
        let node = DagNode::new(
            Bytes::from_static(b"payload"),
            vec![
                DagLink::new("a", leaf_cid(b"child-a"), 7),
                DagLink::new("b", leaf_cid(b"child-b"), 9),
            ],
        );
        let bytes = node.to_bytes();
        let back = DagNode::from_bytes(&bytes).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn link_order_is_preserved() {
        let links: Vec<DagLink> = (0..20)
            .map(|i| DagLink::new(format!("l{i}"), leaf_cid(format!("c{i}").as_bytes()), i))
            .collect();
        let node = DagNode::new(Bytes::new(), links.clone());
        let back = DagNode::from_bytes(&node.to_bytes()).unwrap();
        assert_eq!(back.links(), &links[..]);
    }

    #[test]
    fn serialization_is_deterministic() {
        let make = || {
            DagNode::new(
                Bytes::from_static(b"same"),
                vec![DagLink::new("x", leaf_cid(b"x"), 1)],
            )
        };
        assert_eq!(make().to_bytes(), make().to_bytes());
        assert_eq!(
            make().cid(HashAlgorithm::Sha2_256),
            make().cid(HashAlgorithm::Sha2_256)
        );
    }

    #[test]
    fn size_matches_serialized_length() {
        let node = DagNode::new(
            Bytes::from_static(b"some data"),
            vec![
                DagLink::new("one", leaf_cid(b"1"), 100),
                DagLink::new("", leaf_cid(b"2"), 200),
            ],
        );
        assert_eq!(node.size(), node.to_bytes().len() as u64);

        let empty = DagNode::new(Bytes::new(), Vec::new());
        assert_eq!(empty.size(), 0);
    }

    #[test]
    fn cid_version_follows_hash() {
        let node = DagNode::new(Bytes::from_static(b"v"), Vec::new());
        assert_eq!(node.cid(HashAlgorithm::Sha2_256).version(), CidVersion::V0);
        assert_eq!(node.cid(HashAlgorithm::Sha2_512).version(), CidVersion::V1);
    }

    #[test]
    fn rejects_link_without_hash() {
        // field 2 (links), length-delimited, containing only a Name.
        let raw = [0x12, 0x03, 0x12, 0x01, b'x'];
        let err = DagNode::from_bytes(&raw).unwrap_err();
        assert!(matches!(err, DagError::InvalidLink(_)));
    }

    #[test]
    fn empty_node_is_stable() {
        assert_eq!(empty_node().to_bytes().len(), 0);
        assert_eq!(empty_node_cid(), empty_node_cid());
        assert_ne!(empty_node_cid(), empty_directory_cid());
    }

    #[test]
    fn empty_directory_parses_as_directory() {
        let fs = empty_directory().unixfs().unwrap();
        assert_eq!(fs.node_type(), crate::UnixFsType::Directory);
        assert!(empty_directory().links().is_empty());
    }
}
