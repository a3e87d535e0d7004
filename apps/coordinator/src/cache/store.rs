use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use super::CacheError;

/// Handle to the shared store. `ConnectionManager` multiplexes and
/// reconnects transparently; a plain `Client` is kept alongside for
/// opening the dedicated connections pub/sub subscriptions need.
#[derive(Clone)]
pub struct Store {
    client: Client,
    manager: ConnectionManager,
}

impl Store {
    #[instrument(skip(url))]
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client.clone()).await?;
        info!("shared store connected");
        Ok(Self { client, manager })
    }

    /// A connection for ordinary commands. Cloning a `ConnectionManager` is
    /// cheap; it shares the underlying multiplexed connection.
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// A dedicated connection for `SUBSCRIBE`, which cannot share the
    /// multiplexed connection used for regular commands.
    pub async fn pubsub(&self) -> Result<redis::aio::PubSub, CacheError> {
        let conn = self.client.get_async_connection().await?;
        Ok(conn.into_pubsub())
    }
}
