//! The primitive mutex (§4.3): `SET key value NX PX <ttl>` plus polling,
//! used standalone wherever a resource needs plain mutual exclusion rather
//! than the reader-preferring discipline of [`super::RwLock`] — here, the
//! per-environment installed-package mutex.

use std::time::Duration;

use tokio::time::sleep;

use super::{CacheError, Store};

const DEFAULT_TTL_MS: usize = 30_000;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Mutex {
    store: Store,
    key: String,
    ttl_ms: usize,
    poll_interval: Duration,
    acquire_timeout: Duration,
}

impl Mutex {
    pub fn new(store: Store, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            ttl_ms: DEFAULT_TTL_MS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    async fn try_acquire(&self) -> Result<bool, CacheError> {
        let mut conn = self.store.connection();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg("locked")
            .arg("NX")
            .arg("PX")
            .arg(self.ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(acquired.is_some())
    }

    pub async fn acquire(&self) -> Result<MutexGuard, CacheError> {
        let deadline = tokio::time::Instant::now() + self.acquire_timeout;
        loop {
            if self.try_acquire().await? {
                return Ok(MutexGuard { lock: self.clone() });
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CacheError::LockTimeout(self.acquire_timeout));
            }
            sleep(self.poll_interval).await;
        }
    }
}

pub struct MutexGuard {
    lock: Mutex,
}

impl MutexGuard {
    pub async fn release(self) -> Result<(), CacheError> {
        let mut conn = self.lock.store.connection();
        redis::AsyncCommands::del::<_, ()>(&mut conn, &self.lock.key).await?;
        Ok(())
    }
}
