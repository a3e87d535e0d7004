//! Pub/sub bridge for session lifecycle events (§4.5.1): publishes on the
//! `environments` channel and hands back a subscription stream for the
//! SSE handler.

use futures_util::{Stream, StreamExt};
use redis::AsyncCommands;
use serde::Serialize;
use serde_json::json;

use super::{CacheError, Store};

const CHANNEL: &str = "environments";

#[derive(Clone)]
pub struct Events {
    store: Store,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Start {
        session_id: i64,
        session_start: String,
        ip: String,
        port: u16,
    },
    Stop {
        session_id: i64,
        ip: String,
        port: u16,
    },
}

impl Events {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn publish(&self, event: &SessionEvent) -> Result<(), CacheError> {
        let payload = json!(event).to_string();
        let mut conn = self.store.connection();
        conn.publish::<_, _, ()>(CHANNEL, payload).await?;
        Ok(())
    }

    /// Opens a dedicated subscription; each item is one published message
    /// payload, verbatim.
    pub async fn subscribe(&self) -> Result<impl Stream<Item = String>, CacheError> {
        let mut pubsub = self.store.pubsub().await?;
        pubsub.subscribe(CHANNEL).await?;
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() });
        Ok(stream)
    }
}
