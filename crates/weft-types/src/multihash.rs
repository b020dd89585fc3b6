//! Multihash: a self-describing `(algorithm, digest)` content hash.
//!
//! The binary form is `varint(code) || varint(len) || digest`, compatible
//! with the multiformats registry for the algorithms weft supports.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256, Sha512};

use crate::error::TypeError;

/// The hash algorithms weft understands.
///
/// `Identity` is the degenerate "hash" whose digest is the content
/// itself; it backs inline CIDs and is never length-bounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Identity,
    Sha2_256,
    Sha2_512,
}

impl HashAlgorithm {
    /// Multiformats code for this algorithm.
    pub const fn code(self) -> u64 {
        match self {
            Self::Identity => 0x00,
            Self::Sha2_256 => 0x12,
            Self::Sha2_512 => 0x13,
        }
    }

    /// Canonical registry name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Sha2_256 => "sha2-256",
            Self::Sha2_512 => "sha2-512",
        }
    }

    /// Digest length in bytes; `None` for identity (content-sized).
    pub const fn digest_len(self) -> Option<usize> {
        match self {
            Self::Identity => None,
            Self::Sha2_256 => Some(32),
            Self::Sha2_512 => Some(64),
        }
    }

    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x00 => Ok(Self::Identity),
            0x12 => Ok(Self::Sha2_256),
            0x13 => Ok(Self::Sha2_512),
            other => Err(TypeError::UnknownHashCode(other)),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, TypeError> {
        match name {
            "identity" => Ok(Self::Identity),
            "sha2-256" => Ok(Self::Sha2_256),
            "sha2-512" => Ok(Self::Sha2_512),
            other => Err(TypeError::UnknownHashAlgorithm(other.to_string())),
        }
    }

    /// Hash `data` with this algorithm.
    pub fn digest(self, data: &[u8]) -> Multihash {
        let digest = match self {
            Self::Identity => Bytes::copy_from_slice(data),
            Self::Sha2_256 => Bytes::copy_from_slice(&Sha256::digest(data)),
            Self::Sha2_512 => Bytes::copy_from_slice(&Sha512::digest(data)),
        };
        Multihash {
            algorithm: self,
            digest,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl serde::Serialize for HashAlgorithm {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for HashAlgorithm {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_name(&name).map_err(serde::de::Error::custom)
    }
}

/// A self-describing content hash.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Multihash {
    algorithm: HashAlgorithm,
    digest: Bytes,
}

impl Multihash {
    /// Wrap a pre-computed digest, validating its length.
    pub fn new(algorithm: HashAlgorithm, digest: Bytes) -> Result<Self, TypeError> {
        if let Some(expected) = algorithm.digest_len() {
            if digest.len() != expected {
                return Err(TypeError::InvalidDigestLength {
                    algorithm: algorithm.name(),
                    expected,
                    actual: digest.len(),
                });
            }
        }
        Ok(Self { algorithm, digest })
    }

    /// Hash `data` with `algorithm`.
    pub fn of(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        algorithm.digest(data)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &Bytes {
        &self.digest
    }

    pub fn is_identity(&self) -> bool {
        self.algorithm == HashAlgorithm::Identity
    }

    /// Returns `true` if `data` hashes to this multihash.
    ///
    /// For identity hashes this is a byte comparison with the digest.
    pub fn verify(&self, data: &[u8]) -> bool {
        match self.algorithm {
            HashAlgorithm::Identity => self.digest.as_ref() == data,
            alg => alg.digest(data).digest == self.digest,
        }
    }

    /// Binary form: `varint(code) || varint(len) || digest`.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + 10 + self.digest.len());
        prost::encoding::encode_varint(self.algorithm.code(), &mut buf);
        prost::encoding::encode_varint(self.digest.len() as u64, &mut buf);
        buf.put_slice(&self.digest);
        buf.freeze()
    }

    /// Parse a multihash from the front of `buf`, advancing it.
    pub fn read_from(buf: &mut Bytes) -> Result<Self, TypeError> {
        let code = prost::encoding::decode_varint(buf)
            .map_err(|_| TypeError::InvalidMultihash("truncated code varint".into()))?;
        let len = prost::encoding::decode_varint(buf)
            .map_err(|_| TypeError::InvalidMultihash("truncated length varint".into()))?
            as usize;
        if buf.remaining() < len {
            return Err(TypeError::InvalidMultihash(format!(
                "digest truncated: need {len}, have {}",
                buf.remaining()
            )));
        }
        let digest = buf.copy_to_bytes(len);
        Self::new(HashAlgorithm::from_code(code)?, digest)
    }

    /// Parse a multihash that occupies the whole of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        let mut buf = Bytes::copy_from_slice(data);
        let mh = Self::read_from(&mut buf)?;
        if !buf.is_empty() {
            return Err(TypeError::InvalidMultihash(format!(
                "{} trailing bytes",
                buf.len()
            )));
        }
        Ok(mh)
    }

    /// Base58btc text form (the conventional multihash rendering).
    pub fn to_base58(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Multihash({}:{})",
            self.algorithm.name(),
            hex::encode(&self.digest[..self.digest.len().min(4)])
        )
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha2_256_is_deterministic() {
        let a = Multihash::of(HashAlgorithm::Sha2_256, b"hello");
        let b = Multihash::of(HashAlgorithm::Sha2_256, b"hello");
        assert_eq!(a, b);
        assert_eq!(a.digest().len(), 32);
    }

    #[test]
    fn algorithms_differ() {
        let a = Multihash::of(HashAlgorithm::Sha2_256, b"hello");
        let b = Multihash::of(HashAlgorithm::Sha2_512, b"hello");
        assert_ne!(a, b);
        assert_eq!(b.digest().len(), 64);
    }

    #[test]
    fn identity_digest_is_content() {
        let mh = Multihash::of(HashAlgorithm::Identity, b"inline me");
        assert!(mh.is_identity());
        assert_eq!(mh.digest().as_ref(), b"inline me");
    }

    #[test]
    fn verify_accepts_matching_content() {
        let mh = Multihash::of(HashAlgorithm::Sha2_256, b"data");
        assert!(mh.verify(b"data"));
        assert!(!mh.verify(b"tampered"));
    }

    #[test]
    fn verify_identity() {
        let mh = Multihash::of(HashAlgorithm::Identity, b"x");
        assert!(mh.verify(b"x"));
        assert!(!mh.verify(b"y"));
    }

    #[test]
    fn binary_roundtrip() {
        for alg in [
            HashAlgorithm::Identity,
            HashAlgorithm::Sha2_256,
            HashAlgorithm::Sha2_512,
        ] {
            let mh = Multihash::of(alg, b"roundtrip");
            let parsed = Multihash::from_bytes(&mh.to_bytes()).unwrap();
            assert_eq!(mh, parsed);
        }
    }

    #[test]
    fn sha2_256_wire_prefix() {
        // varint 0x12, varint 0x20, then 32 digest bytes.
        let mh = Multihash::of(HashAlgorithm::Sha2_256, b"abc");
        let bytes = mh.to_bytes();
        assert_eq!(bytes.len(), 34);
        assert_eq!(bytes[0], 0x12);
        assert_eq!(bytes[1], 0x20);
    }

    #[test]
    fn rejects_bad_digest_length() {
        let err =
            Multihash::new(HashAlgorithm::Sha2_256, Bytes::from_static(b"short")).unwrap_err();
        assert!(matches!(err, TypeError::InvalidDigestLength { .. }));
    }

    #[test]
    fn rejects_unknown_code() {
        // varint code 0x99 is not registered.
        let err = Multihash::from_bytes(&[0x99, 0x01, 0x01, 0xaa]).unwrap_err();
        assert!(matches!(err, TypeError::UnknownHashCode(_)));
    }

    #[test]
    fn rejects_truncated_digest() {
        let err = Multihash::from_bytes(&[0x12, 0x20, 0x01]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidMultihash(_)));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mh = Multihash::of(HashAlgorithm::Sha2_256, b"abc");
        let mut bytes = mh.to_bytes().to_vec();
        bytes.push(0xff);
        let err = Multihash::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TypeError::InvalidMultihash(_)));
    }

    #[test]
    fn name_code_mappings() {
        for alg in [
            HashAlgorithm::Identity,
            HashAlgorithm::Sha2_256,
            HashAlgorithm::Sha2_512,
        ] {
            assert_eq!(HashAlgorithm::from_code(alg.code()).unwrap(), alg);
            assert_eq!(HashAlgorithm::from_name(alg.name()).unwrap(), alg);
        }
        assert!(HashAlgorithm::from_name("blake3").is_err());
    }
}
