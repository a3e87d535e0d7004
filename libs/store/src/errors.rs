use thiserror::Error;

/// Failure modes surfaced by the persistent store.
///
/// Kept separate from the HTTP-facing `AppError` in the coordinator crate:
/// this enum only knows about the relational layer, never about status
/// codes.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("schema migration failed: {0}")]
    Schema(String),

    #[error(transparent)]
    Query(#[from] libsql::Error),

    #[error("row mapping failed: {0}")]
    Mapping(String),

    #[error("invalid search parameter: {0}")]
    InvalidParameter(String),

    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("execution {0} not found")]
    ExecutionNotFound(i64),

    #[error("session {0} is still active")]
    SessionStillActive(i64),
}
