use libsql::Connection;
use tracing::{debug, info, instrument};

use crate::errors::StoreError;

/// Base tables, applied in order. Foreign keys reference the parent row and
/// cascade on delete so that deleting a session deletes its executions and
/// reports in one statement (invariant 2 in the spec's testable properties).
const TABLES: &[(&str, &str)] = &[
    (
        "session",
        r#"
        CREATE TABLE IF NOT EXISTS session (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_start TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            session_end TEXT,
            env_ip TEXT NOT NULL,
            env_port INTEGER NOT NULL,
            platform_info TEXT NOT NULL
        );
    "#,
    ),
    (
        "execution",
        r#"
        CREATE TABLE IF NOT EXISTS execution (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_session INTEGER NOT NULL REFERENCES session(id) ON DELETE CASCADE,
            timestamp_registered TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        );
    "#,
    ),
    (
        "report",
        r#"
        CREATE TABLE IF NOT EXISTS report (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fk_execution INTEGER NOT NULL REFERENCES execution(id) ON DELETE CASCADE,
            test_name TEXT NOT NULL,
            test_description TEXT NOT NULL,
            timestamp_start TEXT NOT NULL,
            timestamp_end TEXT NOT NULL,
            result_code INTEGER NOT NULL,
            additional_info TEXT
        );
    "#,
    ),
];

const INDEXES: &[(&str, &str)] = &[
    (
        "idx_session_active_lookup",
        "CREATE INDEX IF NOT EXISTS idx_session_active_lookup ON session(env_ip, env_port, session_end);",
    ),
    (
        "idx_execution_session",
        "CREATE INDEX IF NOT EXISTS idx_execution_session ON execution(fk_session);",
    ),
    (
        "idx_report_execution",
        "CREATE INDEX IF NOT EXISTS idx_report_execution ON report(fk_execution);",
    ),
];

/// Creates tables and indexes if missing, and turns on foreign key
/// enforcement for the given connection. libsql does not inherit pragmas
/// across connections, so every freshly-opened connection must re-enable
/// this before running statements that rely on cascade deletes.
#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("PRAGMA foreign_keys = ON;", ())
        .await
        .map_err(|e| StoreError::Schema(format!("enabling foreign keys: {e}")))?;

    for (name, sql) in TABLES {
        debug!(table = name, "applying table");
        conn.execute(sql, ())
            .await
            .map_err(|e| StoreError::Schema(format!("{name}: {e}")))?;
    }

    for (name, sql) in INDEXES {
        conn.execute(sql, ())
            .await
            .map_err(|e| StoreError::Schema(format!("{name}: {e}")))?;
    }

    info!("store schema up to date");
    Ok(())
}

/// Re-enables `PRAGMA foreign_keys` on a connection obtained after startup.
/// Every request-scoped connection must call this once before use.
pub async fn enable_foreign_keys(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("PRAGMA foreign_keys = ON;", ())
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;
    Ok(())
}
