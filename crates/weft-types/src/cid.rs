//! Content identifiers.
//!
//! A [`Cid`] names a block by its [`Multihash`] plus enough metadata to
//! interpret the block: version, content type, and preferred text
//! encoding. Version 0 is a bare base58btc sha2-256 multihash with an
//! implicit `dag-pb` content type; version 1 prefixes version and codec
//! varints and renders as multibase base32 by default.
//!
//! Equality, hashing, and ordering are by multihash bytes alone: two
//! CIDs naming the same content compare equal regardless of version or
//! text encoding.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::multihash::{HashAlgorithm, Multihash};

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648Lower { padding: false };

/// CID version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CidVersion {
    V0,
    V1,
}

/// Content type carried by a CID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Raw bytes, no structure.
    Raw,
    /// A serialized Merkle DAG node.
    DagPb,
}

impl Codec {
    pub const fn code(self) -> u64 {
        match self {
            Self::Raw => 0x55,
            Self::DagPb => 0x70,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::DagPb => "dag-pb",
        }
    }

    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x55 => Ok(Self::Raw),
            0x70 => Ok(Self::DagPb),
            other => Err(TypeError::UnknownCodecCode(other)),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, TypeError> {
        match name {
            "raw" => Ok(Self::Raw),
            "dag-pb" => Ok(Self::DagPb),
            other => Err(TypeError::UnknownCodec(other.to_string())),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text encoding used when rendering a CID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Multibase `z` prefix; the only encoding valid for v0.
    Base58Btc,
    /// Multibase `b` prefix, lowercase unpadded RFC-4648.
    Base32,
}

/// A self-describing content identifier.
#[derive(Clone)]
pub struct Cid {
    version: CidVersion,
    codec: Codec,
    encoding: Encoding,
    hash: Multihash,
}

impl Cid {
    /// A version-0 CID. Requires sha2-256; the content type is `dag-pb`.
    pub fn new_v0(hash: Multihash) -> Result<Self, TypeError> {
        if hash.algorithm() != HashAlgorithm::Sha2_256 {
            return Err(TypeError::InvalidCid(format!(
                "v0 requires sha2-256, got {}",
                hash.algorithm()
            )));
        }
        Ok(Self {
            version: CidVersion::V0,
            codec: Codec::DagPb,
            encoding: Encoding::Base58Btc,
            hash,
        })
    }

    /// A version-1 CID with an explicit content type.
    pub fn new_v1(codec: Codec, hash: Multihash) -> Self {
        Self {
            version: CidVersion::V1,
            codec,
            encoding: Encoding::Base32,
            hash,
        }
    }

    /// The version the builder defaults to: v0 when the content type is
    /// `dag-pb` and the hash is sha2-256, else v1.
    pub fn suggest(codec: Codec, hash: Multihash) -> Self {
        if codec == Codec::DagPb && hash.algorithm() == HashAlgorithm::Sha2_256 {
            Self::new_v0(hash).expect("sha2-256 checked above")
        } else {
            Self::new_v1(codec, hash)
        }
    }

    /// Hash `data` and name it.
    pub fn for_content(codec: Codec, algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self::suggest(codec, algorithm.digest(data))
    }

    pub fn version(&self) -> CidVersion {
        self.version
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Content-type name, e.g. `"dag-pb"`.
    pub fn content_type(&self) -> &'static str {
        self.codec.name()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn hash(&self) -> &Multihash {
        &self.hash
    }

    /// `true` if the multihash inlines the content itself.
    pub fn is_identity(&self) -> bool {
        self.hash.is_identity()
    }

    /// Render with a different text encoding. No effect on v0, which is
    /// always bare base58btc.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Binary form: the multihash for v0;
    /// `varint(1) || varint(codec) || multihash` for v1.
    pub fn to_bytes(&self) -> Bytes {
        match self.version {
            CidVersion::V0 => self.hash.to_bytes(),
            CidVersion::V1 => {
                let mh = self.hash.to_bytes();
                let mut buf = BytesMut::with_capacity(4 + mh.len());
                prost::encoding::encode_varint(1, &mut buf);
                prost::encoding::encode_varint(self.codec.code(), &mut buf);
                buf.put_slice(&mh);
                buf.freeze()
            }
        }
    }

    /// Parse a binary CID, consuming the whole input.
    ///
    /// A 34-byte sha2-256 multihash is taken as v0 (the 0x12 lead byte
    /// can never be a valid version varint).
    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        if data.len() == 34 && data[0] == 0x12 && data[1] == 0x20 {
            return Self::new_v0(Multihash::from_bytes(data)?);
        }
        let mut buf = Bytes::copy_from_slice(data);
        let version = prost::encoding::decode_varint(&mut buf)
            .map_err(|_| TypeError::InvalidCid("truncated version varint".into()))?;
        if version != 1 {
            return Err(TypeError::InvalidCid(format!("unknown version {version}")));
        }
        let codec = prost::encoding::decode_varint(&mut buf)
            .map_err(|_| TypeError::InvalidCid("truncated codec varint".into()))?;
        let codec = Codec::from_code(codec)?;
        let hash = Multihash::read_from(&mut buf)?;
        if !buf.is_empty() {
            return Err(TypeError::InvalidCid(format!("{} trailing bytes", buf.len())));
        }
        Ok(Self::new_v1(codec, hash))
    }

    /// Canonical text form. Inverse of [`Cid::decode`].
    pub fn encode(&self) -> String {
        match self.version {
            CidVersion::V0 => bs58::encode(self.hash.to_bytes()).into_string(),
            CidVersion::V1 => match self.encoding {
                Encoding::Base32 => {
                    format!("b{}", base32::encode(BASE32, &self.to_bytes()))
                }
                Encoding::Base58Btc => {
                    format!("z{}", bs58::encode(self.to_bytes()).into_string())
                }
            },
        }
    }

    /// Parse a text CID. Accepts bare base58btc v0 ("Qm…") and
    /// multibase `b`/`z` v1 forms.
    pub fn decode(s: &str) -> Result<Self, TypeError> {
        if s.len() == 46 && s.starts_with("Qm") {
            let bytes = bs58::decode(s)
                .into_vec()
                .map_err(|e| TypeError::InvalidCid(format!("base58: {e}")))?;
            return Self::new_v0(Multihash::from_bytes(&bytes)?);
        }
        let mut chars = s.chars();
        match chars.next() {
            Some('b') => {
                let bytes = base32::decode(BASE32, chars.as_str())
                    .ok_or_else(|| TypeError::InvalidCid("invalid base32".into()))?;
                Ok(Self::from_bytes(&bytes)?.with_encoding(Encoding::Base32))
            }
            Some('z') => {
                let bytes = bs58::decode(chars.as_str())
                    .into_vec()
                    .map_err(|e| TypeError::InvalidCid(format!("base58: {e}")))?;
                Ok(Self::from_bytes(&bytes)?.with_encoding(Encoding::Base58Btc))
            }
            Some(prefix) => Err(TypeError::InvalidCid(format!(
                "unsupported multibase prefix {prefix:?}"
            ))),
            None => Err(TypeError::InvalidCid("empty string".into())),
        }
    }

    /// Short form for log output.
    pub fn short(&self) -> String {
        let s = self.encode();
        if s.len() <= 12 {
            s
        } else {
            format!("{}…{}", &s[..6], &s[s.len() - 4..])
        }
    }
}

// Identity is the multihash: version, codec, and encoding are naming
// metadata, not identity.
impl PartialEq for Cid {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Cid {}

impl Hash for Cid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.digest().hash(state);
        self.hash.algorithm().code().hash(state);
    }
}

impl PartialOrd for Cid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash
            .to_bytes()
            .as_ref()
            .cmp(other.hash.to_bytes().as_ref())
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.short())
    }
}

impl FromStr for Cid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha(data: &[u8]) -> Multihash {
        Multihash::of(HashAlgorithm::Sha2_256, data)
    }

    #[test]
    fn v0_text_form_is_qm() {
        let cid = Cid::new_v0(sha(b"hello")).unwrap();
        let s = cid.encode();
        assert!(s.starts_with("Qm"), "got {s}");
        assert_eq!(s.len(), 46);
    }

    #[test]
    fn v0_requires_sha2_256() {
        let mh = Multihash::of(HashAlgorithm::Sha2_512, b"hello");
        assert!(Cid::new_v0(mh).is_err());
    }

    #[test]
    fn v1_text_form_is_multibase_base32() {
        let cid = Cid::new_v1(Codec::Raw, sha(b"hello"));
        let s = cid.encode();
        assert!(s.starts_with('b'), "got {s}");
        assert_eq!(s, s.to_lowercase());
    }

    #[test]
    fn suggest_prefers_v0_for_dag_pb_sha256() {
        let cid = Cid::suggest(Codec::DagPb, sha(b"node"));
        assert_eq!(cid.version(), CidVersion::V0);

        let cid = Cid::suggest(Codec::Raw, sha(b"node"));
        assert_eq!(cid.version(), CidVersion::V1);

        let cid = Cid::suggest(Codec::DagPb, Multihash::of(HashAlgorithm::Sha2_512, b"node"));
        assert_eq!(cid.version(), CidVersion::V1);
    }

    #[test]
    fn decode_is_inverse_of_encode() {
        let cases = vec![
            Cid::new_v0(sha(b"a")).unwrap(),
            Cid::new_v1(Codec::Raw, sha(b"b")),
            Cid::new_v1(Codec::DagPb, Multihash::of(HashAlgorithm::Sha2_512, b"c")),
            Cid::new_v1(Codec::Raw, sha(b"d")).with_encoding(Encoding::Base58Btc),
            Cid::new_v1(Codec::Raw, Multihash::of(HashAlgorithm::Identity, b"tiny")),
        ];
        for cid in cases {
            let s = cid.encode();
            let decoded = Cid::decode(&s).unwrap();
            assert_eq!(decoded, cid);
            // Re-encoding is bit-identical.
            assert_eq!(decoded.encode(), s);
        }
    }

    #[test]
    fn binary_roundtrip_v0_and_v1() {
        let v0 = Cid::new_v0(sha(b"bin")).unwrap();
        let parsed = Cid::from_bytes(&v0.to_bytes()).unwrap();
        assert_eq!(parsed.version(), CidVersion::V0);
        assert_eq!(parsed, v0);

        let v1 = Cid::new_v1(Codec::Raw, sha(b"bin"));
        let parsed = Cid::from_bytes(&v1.to_bytes()).unwrap();
        assert_eq!(parsed.version(), CidVersion::V1);
        assert_eq!(parsed.codec(), Codec::Raw);
        assert_eq!(parsed, v1);
    }

    #[test]
    fn equality_is_by_multihash() {
        let v0 = Cid::new_v0(sha(b"same")).unwrap();
        let v1 = Cid::new_v1(Codec::Raw, sha(b"same"));
        assert_eq!(v0, v1);

        let other = Cid::new_v0(sha(b"different")).unwrap();
        assert_ne!(v0, other);
    }

    #[test]
    fn identity_cid_carries_content() {
        let cid = Cid::for_content(Codec::Raw, HashAlgorithm::Identity, b"xs");
        assert!(cid.is_identity());
        assert_eq!(cid.hash().digest().as_ref(), b"xs");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Cid::decode("").is_err());
        assert!(Cid::decode("?not-a-cid").is_err());
        assert!(Cid::decode("balsonotacid!!!").is_err());
    }

    #[test]
    fn from_bytes_rejects_trailing() {
        let cid = Cid::new_v1(Codec::Raw, sha(b"x"));
        let mut bytes = cid.to_bytes().to_vec();
        bytes.push(0);
        assert!(Cid::from_bytes(&bytes).is_err());
    }

    #[test]
    fn content_type_names() {
        let cid = Cid::new_v0(sha(b"x")).unwrap();
        assert_eq!(cid.content_type(), "dag-pb");
        let cid = Cid::new_v1(Codec::Raw, sha(b"x"));
        assert_eq!(cid.content_type(), "raw");
    }

    #[test]
    fn serde_as_string() {
        let cid = Cid::new_v1(Codec::Raw, sha(b"serde"));
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, format!("\"{}\"", cid.encode()));
        let back: Cid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cid);
    }

    #[test]
    fn ordering_is_stable() {
        let mut cids = vec![
            Cid::for_content(Codec::Raw, HashAlgorithm::Sha2_256, b"b"),
            Cid::for_content(Codec::Raw, HashAlgorithm::Sha2_256, b"a"),
            Cid::for_content(Codec::Raw, HashAlgorithm::Sha2_256, b"c"),
        ];
        cids.sort();
        for w in cids.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }
}
