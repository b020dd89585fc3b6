//! The two protocol variants and their stream handlers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use weft_store::BlockService;
use weft_swap::{BoxStream, PeerConnection, Swarm, SwapEngine, SwapError, WantEntry, WireProtocol};
use weft_types::{Cid, Codec, DataBlock, HashAlgorithm, Multihash, PeerId};

use crate::error::{WireError, WireResult};
use crate::framing::{read_frame, write_frame};
use crate::message::{ReceivedBlock, SwapMessage};
use crate::pb::{PbBlock, PbEntry, PbMessage, PbWantlist};
use crate::prefix::CidPrefix;

pub const PROTOCOL_ID_V1_0: &str = "/ipfs/bitswap/1.0.0";
pub const PROTOCOL_ID_V1_1: &str = "/ipfs/bitswap/1.1.0";

/// Which variant of the wire format a stream speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireVersion {
    /// Multihash want keys, flat block bytes, one message per stream.
    V1_0,
    /// CID want keys, prefixed payload blocks, streaming receive loop.
    V1_1,
}

impl WireVersion {
    pub fn protocol_id(self) -> &'static str {
        match self {
            Self::V1_0 => PROTOCOL_ID_V1_0,
            Self::V1_1 => PROTOCOL_ID_V1_1,
        }
    }

    fn encode_wants(self, wants: &[WantEntry], full: bool) -> PbMessage {
        let entries = wants
            .iter()
            .map(|w| PbEntry {
                block: Some(match self {
                    Self::V1_0 => w.id.hash().to_bytes(),
                    Self::V1_1 => w.id.to_bytes(),
                }),
                priority: Some(w.priority),
                cancel: Some(w.cancel),
            })
            .collect();
        PbMessage {
            wantlist: Some(PbWantlist {
                entries,
                full: Some(full),
            }),
            blocks: Vec::new(),
            payload: Vec::new(),
        }
    }

    fn encode_block(self, block: &DataBlock) -> PbMessage {
        match self {
            Self::V1_0 => PbMessage {
                wantlist: None,
                blocks: vec![block.data().clone()],
                payload: Vec::new(),
            },
            Self::V1_1 => PbMessage {
                wantlist: None,
                blocks: Vec::new(),
                payload: vec![PbBlock {
                    prefix: Some(CidPrefix::of(block.id()).to_bytes()),
                    data: Some(block.data().clone()),
                }],
            },
        }
    }

    fn decode_entry(self, entry: PbEntry) -> WireResult<WantEntry> {
        let key = entry
            .block
            .ok_or_else(|| WireError::Protocol("want entry without a block key".into()))?;
        let id = match self {
            Self::V1_0 => {
                let hash = Multihash::from_bytes(&key)?;
                if hash.algorithm() == HashAlgorithm::Sha2_256 {
                    Cid::new_v0(hash)?
                } else {
                    Cid::new_v1(Codec::DagPb, hash)
                }
            }
            Self::V1_1 => Cid::from_bytes(&key)?,
        };
        Ok(WantEntry {
            id,
            priority: entry.priority.unwrap_or(1),
            cancel: entry.cancel.unwrap_or(false),
        })
    }

    fn decode(self, message: PbMessage) -> WireResult<SwapMessage> {
        let (entries, full) = match message.wantlist {
            Some(wantlist) => (
                wantlist
                    .entries
                    .into_iter()
                    .map(|e| self.decode_entry(e))
                    .collect::<WireResult<Vec<_>>>()?,
                wantlist.full.unwrap_or(false),
            ),
            None => (Vec::new(), false),
        };
        let blocks = match self {
            // 1.0 carries bare bytes; receivers rehash under the
            // protocol's fixed codec and hash.
            Self::V1_0 => message
                .blocks
                .into_iter()
                .map(|data| {
                    Ok(ReceivedBlock {
                        data,
                        content_type: Codec::DagPb.name(),
                        hash_algorithm: HashAlgorithm::Sha2_256,
                    })
                })
                .collect::<WireResult<Vec<_>>>()?,
            // 1.1 carries an explicit prefix per block.
            Self::V1_1 => message
                .payload
                .into_iter()
                .map(|block| {
                    let prefix = block
                        .prefix
                        .ok_or_else(|| WireError::Protocol("payload block without prefix".into()))?;
                    let prefix = CidPrefix::from_bytes(&prefix)?;
                    Ok(ReceivedBlock {
                        data: block.data.unwrap_or_default(),
                        content_type: prefix.codec.name(),
                        hash_algorithm: prefix.hash_algorithm,
                    })
                })
                .collect::<WireResult<Vec<_>>>()?,
        };
        Ok(SwapMessage {
            full,
            entries,
            blocks,
        })
    }
}

/// A bitswap protocol endpoint bound to an exchange engine.
///
/// Registered with the swarm on engine start; `handle` runs the
/// receive loop for inbound streams, the `send_*` methods frame
/// outbound records on dialed streams.
pub struct BitswapProtocol {
    version: WireVersion,
    engine: Arc<SwapEngine>,
}

impl BitswapProtocol {
    pub fn v1_0(engine: Arc<SwapEngine>) -> Arc<Self> {
        Arc::new(Self {
            version: WireVersion::V1_0,
            engine,
        })
    }

    pub fn v1_1(engine: Arc<SwapEngine>) -> Arc<Self> {
        Arc::new(Self {
            version: WireVersion::V1_1,
            engine,
        })
    }

    pub fn version(&self) -> WireVersion {
        self.version
    }

    /// React to one decoded message.
    ///
    /// Cancel entries drop wants; other entries spawn a background
    /// delivery; payload blocks feed the engine. Failures in spawned
    /// work are logged and swallowed.
    async fn process(&self, peer: &PeerId, message: SwapMessage) {
        for entry in message.entries {
            if entry.cancel {
                self.engine.unwant(&entry.id);
                continue;
            }
            let engine = Arc::clone(&self.engine);
            let peer = peer.clone();
            let version = self.version;
            tokio::spawn(async move {
                let id = entry.id.clone();
                if let Err(e) = deliver_block(engine, peer.clone(), entry.id, version).await {
                    debug!(id = %id, peer = %peer, error = %e, "block delivery failed");
                }
            });
        }
        for block in message.blocks {
            if let Err(e) = self
                .engine
                .on_block_received(peer, block.data, block.content_type, block.hash_algorithm)
                .await
            {
                warn!(peer = %peer, error = %e, "failed to accept received block");
            }
        }
    }
}

#[async_trait]
impl WireProtocol for BitswapProtocol {
    fn protocol_id(&self) -> &'static str {
        self.version.protocol_id()
    }

    async fn handle(&self, conn: PeerConnection, mut stream: BoxStream) -> Result<(), SwapError> {
        // Never act on behalf of an unidentified peer.
        if !conn.identity_established().await {
            return Ok(());
        }
        let peer = conn.remote_peer().clone();
        match self.version {
            WireVersion::V1_0 => {
                if let Some(pb) = read_frame::<PbMessage, _>(&mut stream)
                    .await
                    .map_err(SwapError::from)?
                {
                    let message = self.version.decode(pb).map_err(SwapError::from)?;
                    self.process(&peer, message).await;
                }
            }
            WireVersion::V1_1 => {
                while let Some(pb) = read_frame::<PbMessage, _>(&mut stream)
                    .await
                    .map_err(SwapError::from)?
                {
                    let message = self.version.decode(pb).map_err(SwapError::from)?;
                    self.process(&peer, message).await;
                }
            }
        }
        Ok(())
    }

    async fn send_wants(
        &self,
        stream: &mut BoxStream,
        wants: &[WantEntry],
        full: bool,
    ) -> Result<(), SwapError> {
        let message = self.version.encode_wants(wants, full);
        write_frame(stream, &message).await.map_err(SwapError::from)
    }

    async fn send_block(&self, stream: &mut BoxStream, block: &DataBlock) -> Result<(), SwapError> {
        let message = self.version.encode_block(block);
        write_frame(stream, &message).await.map_err(SwapError::from)
    }
}

/// Serve one wanted block to a remote peer.
///
/// A local hit is forwarded directly; a miss pulls the block through
/// the exchange first. No response means no delivery.
async fn deliver_block(
    engine: Arc<SwapEngine>,
    peer: PeerId,
    id: Cid,
    version: WireVersion,
) -> Result<(), SwapError> {
    let block = match engine.block_service()?.try_get_local(&id).await? {
        Some(block) => block,
        None => {
            engine
                .want_async(&id, &peer, CancellationToken::new())
                .await?
        }
    };
    let swarm = engine.swarm()?;
    let mut stream = swarm
        .dial(&peer, version.protocol_id(), CancellationToken::new())
        .await?;
    let message = version.encode_block(&block);
    write_frame(&mut stream, &message)
        .await
        .map_err(SwapError::from)?;
    engine.on_block_sent(&peer, &block).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    use async_trait::async_trait;
    use bytes::Bytes;

    use weft_store::{BlockService, BlockStore, MemoryBlockStore, StoreResult};

    struct MemDepot {
        store: MemoryBlockStore,
        engine: OnceLock<Arc<SwapEngine>>,
    }

    impl MemDepot {
        fn wired(engine: &Arc<SwapEngine>) -> Arc<Self> {
            let depot = Arc::new(Self {
                store: MemoryBlockStore::new(),
                engine: OnceLock::new(),
            });
            let _ = depot.engine.set(Arc::clone(engine));
            engine.set_block_service(Arc::clone(&depot) as Arc<dyn BlockService>);
            depot
        }
    }

    #[async_trait]
    impl BlockService for MemDepot {
        async fn get(&self, id: &Cid, _cancel: CancellationToken) -> StoreResult<DataBlock> {
            self.store.get(id).await
        }

        async fn try_get_local(&self, id: &Cid) -> StoreResult<Option<DataBlock>> {
            self.store.try_get(id).await
        }

        async fn put(&self, block: DataBlock) -> StoreResult<Cid> {
            self.store.put(&block).await?;
            if let Some(engine) = self.engine.get() {
                engine.found(block.id(), &block);
            }
            Ok(block.id().clone())
        }

        async fn exists(&self, id: &Cid) -> StoreResult<bool> {
            self.store.exists(id).await
        }
    }

    fn raw_block(data: &'static [u8]) -> DataBlock {
        DataBlock::from_content(Codec::Raw, HashAlgorithm::Sha2_256, Bytes::from_static(data))
    }

    fn dag_block(data: &'static [u8]) -> DataBlock {
        DataBlock::from_content(Codec::DagPb, HashAlgorithm::Sha2_256, Bytes::from_static(data))
    }

    // -----------------------------------------------------------------------
    // Codec roundtrips
    // -----------------------------------------------------------------------

    #[test]
    fn wants_roundtrip_v1_1() {
        let wants = vec![
            WantEntry::want(raw_block(b"a").id().clone()),
            WantEntry::cancelled(raw_block(b"b").id().clone()),
        ];
        let pb = WireVersion::V1_1.encode_wants(&wants, true);
        let decoded = WireVersion::V1_1.decode(pb).unwrap();
        assert!(decoded.full);
        assert_eq!(decoded.entries, wants);
        // CID parsing preserves the codec across the wire.
        assert_eq!(decoded.entries[0].id.codec(), Codec::Raw);
    }

    #[test]
    fn wants_roundtrip_v1_0() {
        let wants = vec![WantEntry::want(dag_block(b"v0-want").id().clone())];
        let pb = WireVersion::V1_0.encode_wants(&wants, false);
        let decoded = WireVersion::V1_0.decode(pb).unwrap();
        assert!(!decoded.full);
        assert_eq!(decoded.entries, wants);
    }

    #[test]
    fn block_roundtrip_v1_1_preserves_cid() {
        let block = raw_block(b"payload bytes");
        let pb = WireVersion::V1_1.encode_block(&block);
        let decoded = WireVersion::V1_1.decode(pb).unwrap();
        assert_eq!(decoded.blocks.len(), 1);
        let received = &decoded.blocks[0];
        let named = Cid::for_content(
            Codec::from_name(received.content_type).unwrap(),
            received.hash_algorithm,
            &received.data,
        );
        assert_eq!(&named, block.id());
    }

    #[test]
    fn block_roundtrip_v1_0_rehashes() {
        let block = dag_block(b"v0 payload");
        let pb = WireVersion::V1_0.encode_block(&block);
        let decoded = WireVersion::V1_0.decode(pb).unwrap();
        let received = &decoded.blocks[0];
        assert_eq!(received.content_type, "dag-pb");
        assert_eq!(received.hash_algorithm, HashAlgorithm::Sha2_256);
        let named = Cid::for_content(Codec::DagPb, HashAlgorithm::Sha2_256, &received.data);
        assert_eq!(&named, block.id());
    }

    #[test]
    fn default_priority_is_one() {
        let pb = PbMessage {
            wantlist: Some(PbWantlist {
                entries: vec![PbEntry {
                    block: Some(raw_block(b"p").id().to_bytes()),
                    priority: None,
                    cancel: None,
                }],
                full: None,
            }),
            blocks: Vec::new(),
            payload: Vec::new(),
        };
        let decoded = WireVersion::V1_1.decode(pb).unwrap();
        assert_eq!(decoded.entries[0].priority, 1);
        assert!(!decoded.entries[0].cancel);
    }

    #[test]
    fn rejects_entry_without_key() {
        let pb = PbMessage {
            wantlist: Some(PbWantlist {
                entries: vec![PbEntry {
                    block: None,
                    priority: None,
                    cancel: None,
                }],
                full: None,
            }),
            blocks: Vec::new(),
            payload: Vec::new(),
        };
        assert!(matches!(
            WireVersion::V1_1.decode(pb).unwrap_err(),
            WireError::Protocol(_)
        ));
    }

    #[test]
    fn rejects_payload_without_prefix() {
        let pb = PbMessage {
            wantlist: None,
            blocks: Vec::new(),
            payload: vec![PbBlock {
                prefix: None,
                data: Some(Bytes::from_static(b"x")),
            }],
        };
        assert!(matches!(
            WireVersion::V1_1.decode(pb).unwrap_err(),
            WireError::Protocol(_)
        ));
    }

    // -----------------------------------------------------------------------
    // Stream handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn inbound_payload_lands_in_the_store() {
        let engine = SwapEngine::new();
        let depot = MemDepot::wired(&engine);
        let protocol = BitswapProtocol::v1_1(Arc::clone(&engine));

        let block = raw_block(b"pushed over the wire");
        let (mut near, far) = tokio::io::duplex(4096);
        write_frame(&mut near, &WireVersion::V1_1.encode_block(&block))
            .await
            .unwrap();
        drop(near);

        protocol
            .handle(
                PeerConnection::identified(PeerId::new("bob")),
                Box::new(far),
            )
            .await
            .unwrap();

        assert!(depot.store.exists(block.id()).await.unwrap());
        let stats = engine.statistics();
        assert_eq!(stats.blocks_received, 1);
        assert_eq!(stats.data_received, block.size());
        assert_eq!(engine.ledger_for(&PeerId::new("bob")).data_received, block.size());
    }

    #[tokio::test]
    async fn inbound_cancel_drops_the_want() {
        let engine = SwapEngine::new();
        let _depot = MemDepot::wired(&engine);
        let protocol = BitswapProtocol::v1_1(Arc::clone(&engine));

        let id = raw_block(b"cancelled-remotely").id().clone();
        let waiter = {
            let engine = Arc::clone(&engine);
            let id = id.clone();
            tokio::spawn(async move {
                engine
                    .want_async(&id, &PeerId::new("me"), CancellationToken::new())
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(engine.wants().contains(&id));

        let (mut near, far) = tokio::io::duplex(1024);
        let cancel = WireVersion::V1_1
            .encode_wants(&[WantEntry::cancelled(id.clone())], false);
        write_frame(&mut near, &cancel).await.unwrap();
        drop(near);

        protocol
            .handle(
                PeerConnection::identified(PeerId::new("bob")),
                Box::new(far),
            )
            .await
            .unwrap();

        assert!(!engine.wants().contains(&id));
        assert!(matches!(waiter.await.unwrap(), Err(SwapError::Cancelled)));
    }

    #[tokio::test]
    async fn v1_0_processes_exactly_one_message() {
        let engine = SwapEngine::new();
        let depot = MemDepot::wired(&engine);
        let protocol = BitswapProtocol::v1_0(Arc::clone(&engine));

        let first = dag_block(b"first");
        let second = dag_block(b"second");
        let (mut near, far) = tokio::io::duplex(4096);
        write_frame(&mut near, &WireVersion::V1_0.encode_block(&first))
            .await
            .unwrap();
        write_frame(&mut near, &WireVersion::V1_0.encode_block(&second))
            .await
            .unwrap();
        drop(near);

        protocol
            .handle(
                PeerConnection::identified(PeerId::new("bob")),
                Box::new(far),
            )
            .await
            .unwrap();

        assert!(depot.store.exists(first.id()).await.unwrap());
        assert!(!depot.store.exists(second.id()).await.unwrap());
    }

    #[tokio::test]
    async fn v1_1_processes_every_message() {
        let engine = SwapEngine::new();
        let depot = MemDepot::wired(&engine);
        let protocol = BitswapProtocol::v1_1(Arc::clone(&engine));

        let first = raw_block(b"first of many");
        let second = raw_block(b"second of many");
        let (mut near, far) = tokio::io::duplex(4096);
        for block in [&first, &second] {
            write_frame(&mut near, &WireVersion::V1_1.encode_block(block))
                .await
                .unwrap();
        }
        drop(near);

        protocol
            .handle(
                PeerConnection::identified(PeerId::new("bob")),
                Box::new(far),
            )
            .await
            .unwrap();

        assert!(depot.store.exists(first.id()).await.unwrap());
        assert!(depot.store.exists(second.id()).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_frame_closes_the_stream_with_error() {
        let engine = SwapEngine::new();
        let _depot = MemDepot::wired(&engine);
        let protocol = BitswapProtocol::v1_1(Arc::clone(&engine));

        let (mut near, far) = tokio::io::duplex(1024);
        use tokio::io::AsyncWriteExt;
        near.write_all(&[3u8, 0xff, 0xff, 0xff]).await.unwrap();
        drop(near);

        let err = protocol
            .handle(
                PeerConnection::identified(PeerId::new("bob")),
                Box::new(far),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Protocol(_)));
    }
}
