//! The abstract message both wire versions carry.

use bytes::Bytes;

use weft_swap::WantEntry;
use weft_types::HashAlgorithm;

/// A payload block as received, before it has been named.
///
/// The receiver hashes `data` with `hash_algorithm` under
/// `content_type` to recover the CID (version 1.0 fixes both; version
/// 1.1 learns them from the block prefix).
#[derive(Clone, Debug)]
pub struct ReceivedBlock {
    pub data: Bytes,
    pub content_type: &'static str,
    pub hash_algorithm: HashAlgorithm,
}

/// One decoded wire message: a want-list plus carried blocks.
#[derive(Clone, Debug, Default)]
pub struct SwapMessage {
    /// Whether the want-list replaces (rather than extends) what the
    /// sender previously advertised.
    pub full: bool,
    pub entries: Vec<WantEntry>,
    pub blocks: Vec<ReceivedBlock>,
}

impl SwapMessage {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.blocks.is_empty()
    }
}
