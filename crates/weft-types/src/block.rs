//! Content-addressed data blocks.

use bytes::Bytes;

use crate::cid::{Cid, Codec};
use crate::error::TypeError;
use crate::multihash::HashAlgorithm;

/// A block of bytes together with the CID that names it.
///
/// Invariant: the CID's multihash is the hash of `data` — or, for an
/// identity CID, the digest *is* `data`. Constructors uphold this;
/// [`DataBlock::verified`] checks it for externally supplied pairs.
#[derive(Clone, PartialEq, Eq)]
pub struct DataBlock {
    id: Cid,
    data: Bytes,
}

impl DataBlock {
    /// Pair a CID with bytes without re-hashing.
    ///
    /// The caller asserts the invariant (e.g. the bytes were just read
    /// back from a store that verified them).
    pub fn new(id: Cid, data: Bytes) -> Self {
        Self { id, data }
    }

    /// Pair a CID with bytes, verifying the digest.
    pub fn verified(id: Cid, data: Bytes) -> Result<Self, TypeError> {
        if !id.hash().verify(&data) {
            return Err(TypeError::DigestMismatch(id.encode()));
        }
        Ok(Self { id, data })
    }

    /// Hash `data` and name the block.
    pub fn from_content(codec: Codec, algorithm: HashAlgorithm, data: Bytes) -> Self {
        let id = Cid::for_content(codec, algorithm, &data);
        Self { id, data }
    }

    pub fn id(&self) -> &Cid {
        &self.id
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Byte length of the payload.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn into_parts(self) -> (Cid, Bytes) {
        (self.id, self.data)
    }
}

impl std::fmt::Debug for DataBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBlock")
            .field("id", &self.id)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_content_names_by_hash() {
        let block = DataBlock::from_content(
            Codec::Raw,
            HashAlgorithm::Sha2_256,
            Bytes::from_static(b"hello"),
        );
        assert!(block.id().hash().verify(b"hello"));
        assert_eq!(block.size(), 5);
    }

    #[test]
    fn verified_accepts_matching_pair() {
        let id = Cid::for_content(Codec::Raw, HashAlgorithm::Sha2_256, b"payload");
        let block = DataBlock::verified(id, Bytes::from_static(b"payload")).unwrap();
        assert_eq!(block.data().as_ref(), b"payload");
    }

    #[test]
    fn verified_rejects_mismatch() {
        let id = Cid::for_content(Codec::Raw, HashAlgorithm::Sha2_256, b"payload");
        let err = DataBlock::verified(id, Bytes::from_static(b"other")).unwrap_err();
        assert!(matches!(err, TypeError::DigestMismatch(_)));
    }

    #[test]
    fn identity_block_digest_is_payload() {
        let block = DataBlock::from_content(
            Codec::Raw,
            HashAlgorithm::Identity,
            Bytes::from_static(b"tiny"),
        );
        assert!(block.id().is_identity());
        assert_eq!(block.id().hash().digest().as_ref(), b"tiny");
    }
}
