//! UnixFS metadata carried inside DAG-node payloads.

use bytes::Bytes;
use prost::Message;

use crate::error::{DagError, DagResult};
use crate::pb::{PbData, PbDataType};

/// The kind of file-system object a node represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnixFsType {
    /// Raw bytes: identity-inlined leaves.
    Raw,
    Directory,
    File,
}

/// The tagged payload of a file-system DAG node.
///
/// For a file interior node, `block_sizes[i]` is the byte length of the
/// sub-DAG behind link `i`, and `file_size` is their sum. Leaves carry
/// the window bytes in `data` and no block sizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnixFsData {
    node_type: UnixFsType,
    file_size: Option<u64>,
    block_sizes: Vec<u64>,
    data: Option<Bytes>,
}

impl UnixFsData {
    /// A file leaf embedding its window of bytes.
    pub fn file_leaf(data: Bytes) -> Self {
        Self {
            node_type: UnixFsType::File,
            file_size: Some(data.len() as u64),
            block_sizes: Vec::new(),
            data: Some(data),
        }
    }

    /// A file interior node over children of the given byte lengths.
    pub fn file_interior(block_sizes: Vec<u64>) -> Self {
        let total = block_sizes.iter().sum();
        Self {
            node_type: UnixFsType::File,
            file_size: Some(total),
            block_sizes,
            data: None,
        }
    }

    /// A raw leaf (identity-inlined content).
    pub fn raw(data: Bytes) -> Self {
        Self {
            node_type: UnixFsType::Raw,
            file_size: Some(data.len() as u64),
            block_sizes: Vec::new(),
            data: Some(data),
        }
    }

    pub fn directory() -> Self {
        Self {
            node_type: UnixFsType::Directory,
            file_size: None,
            block_sizes: Vec::new(),
            data: None,
        }
    }

    pub fn node_type(&self) -> UnixFsType {
        self.node_type
    }

    pub fn is_directory(&self) -> bool {
        self.node_type == UnixFsType::Directory
    }

    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    pub fn block_sizes(&self) -> &[u64] {
        &self.block_sizes
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn to_bytes(&self) -> Bytes {
        let pb = PbData {
            r#type: match self.node_type {
                UnixFsType::Raw => PbDataType::Raw,
                UnixFsType::Directory => PbDataType::Directory,
                UnixFsType::File => PbDataType::File,
            } as i32,
            data: self.data.clone(),
            filesize: self.file_size,
            blocksizes: self.block_sizes.clone(),
        };
        Bytes::from(pb.encode_to_vec())
    }

    pub fn from_bytes(data: &[u8]) -> DagResult<Self> {
        let pb = PbData::decode(data).map_err(|e| DagError::InvalidUnixFs(e.to_string()))?;
        let node_type = match PbDataType::try_from(pb.r#type) {
            Ok(PbDataType::Raw) => UnixFsType::Raw,
            Ok(PbDataType::Directory) => UnixFsType::Directory,
            Ok(PbDataType::File) => UnixFsType::File,
            Err(_) => {
                return Err(DagError::InvalidUnixFs(format!(
                    "unknown data type {}",
                    pb.r#type
                )))
            }
        };
        Ok(Self {
            node_type,
            file_size: pb.filesize,
            block_sizes: pb.blocksizes,
            data: pb.data,
        })
    }
}
