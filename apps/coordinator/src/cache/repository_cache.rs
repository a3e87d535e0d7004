//! Cache mirror of the on-disk package repository (§4.4): `repository:<name>`
//! holds a package's manifest JSON, `repository_index` is a sorted set of
//! names kept for deterministic, alphabetically-ordered listing.

use redis::AsyncCommands;
use serde_json::Value;

use super::{CacheError, Store};

const INDEX_KEY: &str = "repository_index";

#[derive(Clone)]
pub struct RepositoryCache {
    store: Store,
}

impl RepositoryCache {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn entry_key(name: &str) -> String {
        format!("repository:{name}")
    }

    pub async fn put(&self, name: &str, manifest: &Value) -> Result<(), CacheError> {
        let mut conn = self.store.connection();
        let text = manifest.to_string();
        conn.set::<_, _, ()>(Self::entry_key(name), text).await?;
        conn.zadd::<_, _, _, ()>(INDEX_KEY, name, 0).await?;
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Result<(), CacheError> {
        let mut conn = self.store.connection();
        conn.del::<_, ()>(Self::entry_key(name)).await?;
        conn.zrem::<_, _, ()>(INDEX_KEY, name).await?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.store.connection();
        let raw: Option<String> = conn.get(Self::entry_key(name)).await?;
        raw.map(|text| {
            serde_json::from_str(&text).map_err(|e| CacheError::Corrupt(e.to_string()))
        })
        .transpose()
    }

    pub async fn list_names(&self) -> Result<Vec<String>, CacheError> {
        let mut conn = self.store.connection();
        let names: Vec<String> = conn.zrange(INDEX_KEY, 0, -1).await?;
        Ok(names)
    }

    pub async fn list(&self) -> Result<Vec<Value>, CacheError> {
        let names = self.list_names().await?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(manifest) = self.get(&name).await? {
                out.push(manifest);
            }
        }
        Ok(out)
    }
}
