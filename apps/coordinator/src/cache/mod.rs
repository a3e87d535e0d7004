//! The shared key/value store (C3, §4.3): a namespaced Redis-backed cache
//! for the package repository and per-node installed state, plus a
//! reader-preferring lock derived from a primitive mutex and a timed
//! sorted set.

pub mod environment_cache;
pub mod events;
pub mod mutex;
pub mod repository_cache;
pub mod rwlock;
pub mod store;

pub use environment_cache::EnvironmentCache;
pub use events::Events;
pub use mutex::Mutex;
pub use repository_cache::RepositoryCache;
pub use rwlock::RwLock;
pub use store::Store;

/// Key of the per-environment installed-package mutex (§6's persisted-state
/// enumeration: `environments:<ip>:<port>:installed:mutex`).
pub fn environment_mutex_key(ip: &str, port: u16) -> String {
    format!("environments:{ip}:{port}:installed:mutex")
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache operation failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cached manifest is not valid JSON: {0}")]
    Corrupt(String),
    #[error("lock acquisition timed out after {0:?}")]
    LockTimeout(std::time::Duration),
}
