//! The composition root's shared state: one `AppState` clone is handed to
//! every handler and middleware function via axum's `State` extractor.

use std::path::PathBuf;

use secchiware_store::StoreClient;

use crate::cache::{self, EnvironmentCache, Events, Mutex as CacheMutex, RepositoryCache, RwLock, Store as CacheStore};
use crate::config::Config;
use crate::node_client::NodeClient;
use crate::signature::Keyring;

const REPOSITORY_LOCK_RESOURCE: &str = "repository";

#[derive(Clone)]
pub struct AppState {
    pub store: StoreClient,
    pub cache: CacheStore,
    pub repository_lock: RwLock,
    pub repository_cache: RepositoryCache,
    pub environment_cache: EnvironmentCache,
    pub events: Events,
    pub keyring: Keyring,
    pub node_client: NodeClient,
    pub tests_dir: PathBuf,
}

impl AppState {
    pub async fn build(config: &Config) -> Result<Self, anyhow::Error> {
        let store = StoreClient::connect(&config.database_path).await?;
        let cache = CacheStore::connect(&config.redis_url).await?;

        let repository_lock = RwLock::new(cache.clone(), REPOSITORY_LOCK_RESOURCE);
        let repository_cache = RepositoryCache::new(cache.clone());
        let environment_cache = EnvironmentCache::new(cache.clone());
        let events = Events::new(cache.clone());

        let keyring = Keyring::new(config.client_secret.clone(), config.node_secret.clone());
        let node_client = NodeClient::new(keyring.clone());

        Ok(Self {
            store,
            cache,
            repository_lock,
            repository_cache,
            environment_cache,
            events,
            keyring,
            node_client,
            tests_dir: PathBuf::from(&config.tests_dir),
        })
    }

    /// Builds a handle to the per-environment installed-package mutex for
    /// (ip, port); cheap, not held onto between requests.
    pub fn environment_mutex(&self, ip: &str, port: u16) -> CacheMutex {
        CacheMutex::new(self.cache.clone(), cache::environment_mutex_key(ip, port))
    }
}
