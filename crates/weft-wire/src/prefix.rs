//! The CID prefix carried with version-1.1 payload blocks.

use bytes::{Buf, Bytes, BytesMut};

use weft_types::{Cid, CidVersion, Codec, HashAlgorithm};

use crate::error::{WireError, WireResult};

/// `(cid version, codec, hash algorithm, hash length)` as four varints.
///
/// Lets a receiver name a payload block before hashing it: the prefix
/// says which codec and hash to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CidPrefix {
    pub version: u64,
    pub codec: Codec,
    pub hash_algorithm: HashAlgorithm,
    pub hash_len: u64,
}

impl CidPrefix {
    pub fn of(id: &Cid) -> Self {
        Self {
            version: match id.version() {
                CidVersion::V0 => 0,
                CidVersion::V1 => 1,
            },
            codec: id.codec(),
            hash_algorithm: id.hash().algorithm(),
            hash_len: id.hash().digest().len() as u64,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        prost::encoding::encode_varint(self.version, &mut buf);
        prost::encoding::encode_varint(self.codec.code(), &mut buf);
        prost::encoding::encode_varint(self.hash_algorithm.code(), &mut buf);
        prost::encoding::encode_varint(self.hash_len, &mut buf);
        buf.freeze()
    }

    pub fn from_bytes(data: &[u8]) -> WireResult<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        let mut next = |what: &str| -> WireResult<u64> {
            prost::encoding::decode_varint(&mut buf)
                .map_err(|_| WireError::Protocol(format!("truncated {what} in block prefix")))
        };
        let version = next("version")?;
        if version > 1 {
            return Err(WireError::Protocol(format!(
                "unsupported cid version {version} in block prefix"
            )));
        }
        let codec = Codec::from_code(next("codec")?)?;
        let hash_algorithm = HashAlgorithm::from_code(next("hash algorithm")?)?;
        let hash_len = next("hash length")?;
        if buf.has_remaining() {
            return Err(WireError::Protocol("trailing bytes in block prefix".into()));
        }
        Ok(Self {
            version,
            codec,
            hash_algorithm,
            hash_len,
        })
    }

    /// Name `data` the way the sender did.
    pub fn cid_for(&self, data: &[u8]) -> WireResult<Cid> {
        let hash = self.hash_algorithm.digest(data);
        if self.hash_algorithm != HashAlgorithm::Identity
            && hash.digest().len() as u64 != self.hash_len
        {
            return Err(WireError::Protocol(format!(
                "block prefix hash length {} does not match {}",
                self.hash_len,
                hash.digest().len()
            )));
        }
        match self.version {
            0 => Ok(Cid::new_v0(hash)?),
            _ => Ok(Cid::new_v1(self.codec, hash)),
        }
    }
}
