use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{info, instrument};

use crate::errors::StoreError;
use crate::schema::{apply_schema, enable_foreign_keys};

/// Handle to the coordinator's relational store.
///
/// Holds the `libsql::Database` handle and hands out one `Connection` per
/// caller; connections are never shared across concurrent requests (see
/// the coordinator's concurrency model), only the underlying `Database`
/// is.
#[derive(Clone)]
pub struct StoreClient {
    database: Arc<Database>,
    /// Keeps an in-memory database alive for its lifetime; dropped (and the
    /// schema with it) only when the last `StoreClient` clone is dropped.
    _memory_anchor: Option<Arc<Connection>>,
}

impl StoreClient {
    /// Opens (and if necessary creates) the database at `path`. `path` may
    /// be a filesystem path or `:memory:`.
    #[instrument]
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        if path.is_empty() {
            return Err(StoreError::Connection("database path is empty".into()));
        }

        let is_memory = path == ":memory:" || path.contains("mode=memory");

        let database = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let database = Arc::new(database);

        let bootstrap = database
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        apply_schema(&bootstrap).await?;

        // An in-memory database is dropped as soon as its last connection
        // closes; keep one connection open for the client's lifetime so the
        // schema survives between request-scoped connections.
        let anchor = if is_memory {
            Some(Arc::new(bootstrap))
        } else {
            None
        };

        info!(path, "store connected");
        Ok(Self {
            database,
            _memory_anchor: anchor,
        })
    }

    /// Acquires a fresh connection for the duration of one request.
    pub async fn connection(&self) -> Result<Connection, StoreError> {
        let conn = self
            .database
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        enable_foreign_keys(&conn).await?;
        Ok(conn)
    }
}
