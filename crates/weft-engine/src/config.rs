use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use weft_files::AddOptions;
use weft_store::StoreConfig;

/// Default ceiling on providers requested per lookup.
pub const DEFAULT_PROVIDER_LIMIT: usize = 20;

/// Configuration for a [`WeftEngine`].
///
/// [`WeftEngine`]: crate::engine::WeftEngine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Repository root; the block store lives at `<repo>/blocks`.
    pub repo_root: PathBuf,
    pub store: StoreConfig,
    /// Defaults applied when callers pass no explicit add options.
    pub add: AddOptions,
    /// Providers requested from the router per needed block.
    pub provider_limit: usize,
}

impl EngineConfig {
    /// A configuration rooted at `repo_root` with defaults everywhere
    /// else.
    pub fn at(repo_root: impl AsRef<Path>) -> Self {
        let repo_root = repo_root.as_ref().to_path_buf();
        Self {
            store: StoreConfig::at(repo_root.join("blocks")),
            repo_root,
            add: AddOptions::default(),
            provider_limit: DEFAULT_PROVIDER_LIMIT,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::at(".weft")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_live_under_the_repo() {
        let config = EngineConfig::at("/data/weft");
        assert_eq!(config.repo_root, PathBuf::from("/data/weft"));
        assert_eq!(config.store.root, PathBuf::from("/data/weft/blocks"));
        assert_eq!(config.provider_limit, 20);
    }

    #[test]
    fn serde_roundtrip() {
        let config = EngineConfig::at("/tmp/w");
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.repo_root, config.repo_root);
        assert_eq!(back.store.max_block_size, config.store.max_block_size);
    }
}
