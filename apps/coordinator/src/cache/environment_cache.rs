//! Per-node installed-package cache mirror (§3, §4.5.2): a hash keyed
//! `environments:<ip>:<port>` holding the `installed_cached` flag and one
//! `installed:<package>` field per cached manifest, plus an ordered index
//! set for deterministic listing.

use redis::AsyncCommands;
use serde_json::Value;

use super::{CacheError, Store};

#[derive(Clone)]
pub struct EnvironmentCache {
    store: Store,
}

const INSTALLED_CACHED_FIELD: &str = "installed_cached";

impl EnvironmentCache {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn hash_key(ip: &str, port: u16) -> String {
        format!("environments:{ip}:{port}")
    }

    fn index_key(ip: &str, port: u16) -> String {
        format!("environments:{ip}:{port}:installed_index")
    }

    fn field(package: &str) -> String {
        format!("installed:{package}")
    }

    pub async fn is_primed(&self, ip: &str, port: u16) -> Result<bool, CacheError> {
        let mut conn = self.store.connection();
        let flag: Option<String> = conn.hget(Self::hash_key(ip, port), INSTALLED_CACHED_FIELD).await?;
        Ok(flag.as_deref() == Some("1"))
    }

    pub async fn mark_uncached(&self, ip: &str, port: u16) -> Result<(), CacheError> {
        let mut conn = self.store.connection();
        conn.hset::<_, _, _, ()>(Self::hash_key(ip, port), INSTALLED_CACHED_FIELD, "0")
            .await?;
        Ok(())
    }

    pub async fn mark_primed(&self, ip: &str, port: u16) -> Result<(), CacheError> {
        let mut conn = self.store.connection();
        conn.hset::<_, _, _, ()>(Self::hash_key(ip, port), INSTALLED_CACHED_FIELD, "1")
            .await?;
        Ok(())
    }

    pub async fn put_package(&self, ip: &str, port: u16, package: &str, manifest: &Value) -> Result<(), CacheError> {
        let mut conn = self.store.connection();
        conn.hset::<_, _, _, ()>(Self::hash_key(ip, port), Self::field(package), manifest.to_string())
            .await?;
        conn.zadd::<_, _, _, ()>(Self::index_key(ip, port), package, 0).await?;
        Ok(())
    }

    pub async fn remove_package(&self, ip: &str, port: u16, package: &str) -> Result<(), CacheError> {
        let mut conn = self.store.connection();
        conn.hdel::<_, _, ()>(Self::hash_key(ip, port), Self::field(package)).await?;
        conn.zrem::<_, _, ()>(Self::index_key(ip, port), package).await?;
        Ok(())
    }

    pub async fn list_installed(&self, ip: &str, port: u16) -> Result<Vec<Value>, CacheError> {
        let mut conn = self.store.connection();
        let names: Vec<String> = conn.zrange(Self::index_key(ip, port), 0, -1).await?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let raw: Option<String> = conn.hget(Self::hash_key(ip, port), Self::field(&name)).await?;
            if let Some(raw) = raw {
                let manifest: Value =
                    serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt(e.to_string()))?;
                out.push(manifest);
            }
        }
        Ok(out)
    }

    /// Drops the entire cache namespace for (ip, port): called when a
    /// session ends or is implicitly superseded by re-registration.
    pub async fn clear(&self, ip: &str, port: u16) -> Result<(), CacheError> {
        let mut conn = self.store.connection();
        conn.del::<_, ()>(Self::hash_key(ip, port)).await?;
        conn.del::<_, ()>(Self::index_key(ip, port)).await?;
        Ok(())
    }
}
