//! Reader-preferring reader/writer lock (§4.3), built on a primitive
//! `SET key value NX PX <ttl>` mutex and a sorted set of reader ids scored
//! by expiry. A writer blocks while the readers set is non-empty or the
//! mutex is held; a reader never blocks another reader. Expired readers
//! are purged only from the writer's acquire loop, per `original_source/`
//! (see DESIGN.md).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::AsyncCommands;
use tokio::time::sleep;

use super::{CacheError, Store};

const DEFAULT_MUTEX_TTL_MS: usize = 30_000;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_READING_TIMEOUT_SECS: i64 = 30;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RwLock {
    store: Store,
    resource: String,
    mutex_ttl_ms: usize,
    poll_interval: Duration,
    reading_timeout_secs: i64,
    acquire_timeout: Duration,
}

impl RwLock {
    pub fn new(store: Store, resource: impl Into<String>) -> Self {
        Self {
            store,
            resource: resource.into(),
            mutex_ttl_ms: DEFAULT_MUTEX_TTL_MS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reading_timeout_secs: DEFAULT_READING_TIMEOUT_SECS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    fn mutex_key(&self) -> String {
        format!("{}:mutex", self.resource)
    }

    fn readers_key(&self) -> String {
        format!("{}:readers", self.resource)
    }

    fn reader_seq_key(&self) -> String {
        format!("{}:reader_seq", self.resource)
    }

    fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs() as i64
    }

    async fn try_acquire_mutex(&self) -> Result<bool, CacheError> {
        let mut conn = self.store.connection();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(self.mutex_key())
            .arg("locked")
            .arg("NX")
            .arg("PX")
            .arg(self.mutex_ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(acquired.is_some())
    }

    async fn release_mutex(&self) -> Result<(), CacheError> {
        let mut conn = self.store.connection();
        conn.del::<_, ()>(self.mutex_key()).await?;
        Ok(())
    }

    /// Blocks (polling) until the lock is free of readers and the mutex is
    /// acquired, purging expired reader entries on each attempt.
    pub async fn acquire_writer(&self) -> Result<WriterGuard, CacheError> {
        let deadline = tokio::time::Instant::now() + self.acquire_timeout;
        loop {
            let mut conn = self.store.connection();
            let now = Self::now_secs();
            conn.zrembyscore::<_, _, _, ()>(self.readers_key(), "-inf", now)
                .await?;
            let readers_count: isize = conn.zcard(self.readers_key()).await?;

            if readers_count == 0 && self.try_acquire_mutex().await? {
                return Ok(WriterGuard { lock: self.clone() });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(CacheError::LockTimeout(self.acquire_timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Registers a new reader, serialised by the mutex only for the
    /// duration of the membership change; readers never block each other.
    pub async fn acquire_reader(&self) -> Result<ReaderGuard, CacheError> {
        let deadline = tokio::time::Instant::now() + self.acquire_timeout;
        loop {
            if self.try_acquire_mutex().await? {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CacheError::LockTimeout(self.acquire_timeout));
            }
            sleep(self.poll_interval).await;
        }

        let mut conn = self.store.connection();
        let reader_id: i64 = conn.incr(self.reader_seq_key(), 1).await?;
        let expiry = Self::now_secs() + self.reading_timeout_secs;
        conn.zadd::<_, _, _, ()>(self.readers_key(), reader_id, expiry)
            .await?;
        self.release_mutex().await?;

        Ok(ReaderGuard {
            lock: self.clone(),
            reader_id,
        })
    }
}

pub struct WriterGuard {
    lock: RwLock,
}

impl WriterGuard {
    pub async fn release(self) -> Result<(), CacheError> {
        self.lock.release_mutex().await
    }
}

pub struct ReaderGuard {
    lock: RwLock,
    reader_id: i64,
}

impl ReaderGuard {
    pub async fn release(self) -> Result<(), CacheError> {
        let mut conn = self.lock.store.connection();
        conn.zrem::<_, _, ()>(self.lock.readers_key(), self.reader_id)
            .await?;
        Ok(())
    }
}
