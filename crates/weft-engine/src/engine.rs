//! Engine construction, wiring, and lifecycle.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use weft_files::FileAdder;
use weft_store::{BlockService, BlockStore, FsBlockStore};
use weft_swap::{Router, Swarm, SwapEngine, WireProtocol};
use weft_types::Cid;
use weft_wire::BitswapProtocol;

use crate::api::{BlockApi, FilesApi, StatsApi, SwapApi};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::service::ExchangeBlockService;

pub(crate) struct EngineRunning {
    pub(crate) swarm: Arc<dyn Swarm>,
    pub(crate) router: Arc<dyn Router>,
    pub(crate) stop: CancellationToken,
}

/// The embedded weft engine.
///
/// Construction is explicit and leaves-first: the store, then the
/// exchange engine, then the wire protocols and the exchange-aware
/// block service, injected in dependency order — the swap↔service
/// cycle is resolved by constructing the engine first and setting the
/// service afterwards. The swarm and router arrive at
/// [`WeftEngine::start`].
pub struct WeftEngine {
    config: EngineConfig,
    store: Arc<dyn BlockStore>,
    swap: Arc<SwapEngine>,
    service: Arc<dyn BlockService>,
    adder: Arc<FileAdder>,
    pins: Arc<RwLock<HashSet<Cid>>>,
    state: Arc<Mutex<Option<EngineRunning>>>,
}

impl WeftEngine {
    /// Build and wire all services rooted at the configured repo.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let store: Arc<dyn BlockStore> = Arc::new(FsBlockStore::open(config.store.clone())?);
        let swap = SwapEngine::new();
        let service: Arc<dyn BlockService> = Arc::new(ExchangeBlockService::new(
            Arc::clone(&store),
            Arc::clone(&swap),
        ));
        swap.set_block_service(Arc::clone(&service));
        swap.set_protocols(vec![
            BitswapProtocol::v1_1(Arc::clone(&swap)) as Arc<dyn WireProtocol>,
            BitswapProtocol::v1_0(Arc::clone(&swap)) as Arc<dyn WireProtocol>,
        ]);
        let adder = Arc::new(
            FileAdder::new(Arc::clone(&service)).with_inline(
                config.store.allow_inline_cid,
                config.store.inline_cid_limit,
            ),
        );
        Ok(Self {
            config,
            store,
            swap,
            service,
            adder,
            pins: Arc::new(RwLock::new(HashSet::new())),
            state: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the engine on a swarm and router.
    ///
    /// Fails with [`EngineError::AlreadyStarted`] on a running engine;
    /// start-after-stop is fine.
    pub async fn start(
        &self,
        swarm: Arc<dyn Swarm>,
        router: Arc<dyn Router>,
    ) -> EngineResult<()> {
        let stop = CancellationToken::new();
        {
            let mut state = self.state.lock().expect("lock poisoned");
            if state.is_some() {
                return Err(EngineError::AlreadyStarted);
            }
            *state = Some(EngineRunning {
                swarm: Arc::clone(&swarm),
                router: Arc::clone(&router),
                stop: stop.clone(),
            });
        }
        if let Err(e) = self.swap.start(Arc::clone(&swarm)).await {
            self.state.lock().expect("lock poisoned").take();
            return Err(e.into());
        }

        // A newly wanted CID triggers a provider lookup; discovered
        // providers are dialed with the full want-list.
        let mut needed = self.swap.subscribe_needed();
        let swap = Arc::clone(&self.swap);
        let provider_limit = self.config.provider_limit;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    id = needed.recv() => match id {
                        Ok(id) => {
                            let swap = Arc::clone(&swap);
                            let swarm = Arc::clone(&swarm);
                            let router = Arc::clone(&router);
                            let cancel = stop.child_token();
                            tokio::spawn(async move {
                                lookup_providers(swap, swarm, router, id, provider_limit, cancel)
                                    .await;
                            });
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "needed-block notifications lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        info!(repo = %self.config.repo_root.display(), "engine started");
        Ok(())
    }

    /// Stop the engine. Always safe; a second stop is a no-op.
    pub async fn stop(&self) {
        let state = self.state.lock().expect("lock poisoned").take();
        let Some(state) = state else {
            return;
        };
        state.stop.cancel();
        self.swap.stop().await;
        info!("engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().expect("lock poisoned").is_some()
    }

    /// The swarm supplied at start.
    pub fn swarm(&self) -> EngineResult<Arc<dyn Swarm>> {
        self.state
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|running| Arc::clone(&running.swarm))
            .ok_or(EngineError::NotStarted)
    }

    /// The router supplied at start.
    pub fn router(&self) -> EngineResult<Arc<dyn Router>> {
        self.state
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|running| Arc::clone(&running.router))
            .ok_or(EngineError::NotStarted)
    }

    // -----------------------------------------------------------------------
    // Handles
    // -----------------------------------------------------------------------

    pub fn blocks(&self) -> BlockApi {
        BlockApi {
            store: Arc::clone(&self.store),
            service: Arc::clone(&self.service),
        }
    }

    pub fn files(&self) -> FilesApi {
        FilesApi {
            service: Arc::clone(&self.service),
            adder: Arc::clone(&self.adder),
            pins: Arc::clone(&self.pins),
            state: Arc::clone(&self.state),
            defaults: self.config.add.clone(),
        }
    }

    pub fn bitswap(&self) -> SwapApi {
        SwapApi {
            swap: Arc::clone(&self.swap),
        }
    }

    pub fn stats(&self) -> StatsApi {
        StatsApi {
            store: Arc::clone(&self.store),
            swap: Arc::clone(&self.swap),
        }
    }

    /// The underlying exchange engine, for advanced embedding.
    pub fn swap_engine(&self) -> &Arc<SwapEngine> {
        &self.swap
    }

    // -----------------------------------------------------------------------
    // Pin hooks
    // -----------------------------------------------------------------------

    pub fn pin(&self, id: &Cid) {
        self.pins.write().expect("lock poisoned").insert(id.clone());
    }

    pub fn unpin(&self, id: &Cid) -> bool {
        self.pins.write().expect("lock poisoned").remove(id)
    }

    pub fn is_pinned(&self, id: &Cid) -> bool {
        self.pins.read().expect("lock poisoned").contains(id)
    }

    pub fn pins(&self) -> Vec<Cid> {
        self.pins
            .read()
            .expect("lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

/// Ask the router who can provide `id`, make those peers known, and
/// send them the full want-list. Best-effort: failures are logged.
async fn lookup_providers(
    swap: Arc<SwapEngine>,
    swarm: Arc<dyn Swarm>,
    router: Arc<dyn Router>,
    id: Cid,
    limit: usize,
    cancel: CancellationToken,
) {
    let providers = match router.find_providers(&id, limit, cancel).await {
        Ok(providers) => providers,
        Err(e) => {
            warn!(id = %id, error = %e, "provider lookup failed");
            return;
        }
    };
    if providers.is_empty() {
        debug!(id = %id, "no providers found");
        return;
    }
    let wants: Vec<_> = swap
        .wants()
        .into_iter()
        .map(weft_swap::WantEntry::want)
        .collect();
    for provider in providers {
        swarm.register_peer(provider.clone());
        if let Err(e) = swap.send_wantlist_to_peer(&provider, &wants, true).await {
            debug!(peer = %provider, error = %e, "could not reach provider");
        }
    }
}
