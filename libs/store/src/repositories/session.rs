use std::collections::HashMap;

use indexmap::IndexMap;
use libsql::{params, Connection, Row};
use serde_json::Value;

use crate::errors::StoreError;
use crate::models::Session;
use crate::search::{build_query, SearchSpec};

fn row_to_session(row: &Row) -> Result<Session, StoreError> {
    let platform_raw: String = row.get(5).map_err(|e| StoreError::Mapping(e.to_string()))?;
    let platform_info: Value = serde_json::from_str(&platform_raw)
        .map_err(|e| StoreError::Mapping(format!("platform_info: {e}")))?;
    Ok(Session {
        id: row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?,
        session_start: row.get(1).map_err(|e| StoreError::Mapping(e.to_string()))?,
        session_end: row.get(2).map_err(|e| StoreError::Mapping(e.to_string()))?,
        env_ip: row.get(3).map_err(|e| StoreError::Mapping(e.to_string()))?,
        env_port: row.get::<i64>(4).map_err(|e| StoreError::Mapping(e.to_string()))? as u16,
        platform_info,
    })
}

const SELECT_COLUMNS: &str = "id, session_start, session_end, env_ip, env_port, platform_info";

pub struct SessionRepository;

impl SessionRepository {
    /// Inserts a new session row. The caller is responsible for having
    /// already ended any prior active session at the same (ip, port).
    pub async fn insert(
        conn: &Connection,
        env_ip: &str,
        env_port: u16,
        platform_info: &Value,
    ) -> Result<Session, StoreError> {
        let platform_text = serde_json::to_string(platform_info)
            .map_err(|e| StoreError::Mapping(e.to_string()))?;

        conn.execute(
            "INSERT INTO session (env_ip, env_port, platform_info) VALUES (?1, ?2, ?3)",
            params![env_ip, env_port as i64, platform_text],
        )
        .await?;

        let id = conn.last_insert_rowid();
        Self::get(conn, id).await
    }

    pub async fn get(conn: &Connection, id: i64) -> Result<Session, StoreError> {
        let mut rows = conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM session WHERE id = ?1"),
                params![id],
            )
            .await?;
        let row = rows.next().await?.ok_or(StoreError::SessionNotFound(id))?;
        row_to_session(&row)
    }

    /// The session currently active (`session_end IS NULL`) at this
    /// address, if any. At most one such row should ever exist.
    pub async fn find_active_by_addr(
        conn: &Connection,
        env_ip: &str,
        env_port: u16,
    ) -> Result<Option<Session>, StoreError> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM session WHERE env_ip = ?1 AND env_port = ?2 AND session_end IS NULL"
                ),
                params![env_ip, env_port as i64],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_session(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_active(conn: &Connection) -> Result<Vec<Session>, StoreError> {
        let mut rows = conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM session WHERE session_end IS NULL ORDER BY id"),
                (),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_session(&row)?);
        }
        Ok(out)
    }

    /// Ends every still-active session, stamping all of them with the same
    /// end timestamp. Used on graceful shutdown.
    pub async fn end_all_active(conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "UPDATE session SET session_end = strftime('%Y-%m-%dT%H:%M:%SZ','now') WHERE session_end IS NULL",
            (),
        )
        .await?;
        Ok(())
    }

    /// Ends one active session by id. Returns `false` if it was already
    /// ended or did not exist.
    pub async fn end(conn: &Connection, id: i64) -> Result<bool, StoreError> {
        let affected = conn
            .execute(
                "UPDATE session SET session_end = strftime('%Y-%m-%dT%H:%M:%SZ','now') WHERE id = ?1 AND session_end IS NULL",
                params![id],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Ends the active session at (ip, port), if any, returning it with its
    /// new `session_end` populated.
    pub async fn end_active_by_addr(
        conn: &Connection,
        env_ip: &str,
        env_port: u16,
    ) -> Result<Option<Session>, StoreError> {
        let Some(active) = Self::find_active_by_addr(conn, env_ip, env_port).await? else {
            return Ok(None);
        };
        Self::end(conn, active.id).await?;
        Ok(Some(Self::get(conn, active.id).await?))
    }

    /// Deletes a session and (via `ON DELETE CASCADE`) its executions and
    /// their reports. Fails if the session is still active, per the spec's
    /// "deletable only once ended" rule.
    pub async fn delete(conn: &Connection, id: i64) -> Result<(), StoreError> {
        let session = Self::get(conn, id).await?;
        if session.session_end.is_none() {
            return Err(StoreError::SessionStillActive(id));
        }
        conn.execute("DELETE FROM session WHERE id = ?1", params![id])
            .await?;
        Ok(())
    }

    pub async fn search(
        conn: &Connection,
        params: &IndexMap<String, String>,
    ) -> Result<Vec<Session>, StoreError> {
        let mut order_by = HashMap::new();
        order_by.insert("id", "id");
        order_by.insert("start", "session_start");
        order_by.insert("end", "session_end");

        let mut filters = HashMap::new();
        filters.insert("ip", ("env_ip", "="));
        filters.insert("port", ("env_port", "="));

        let spec = SearchSpec {
            table: "session",
            select: SELECT_COLUMNS,
            order_by: &order_by,
            filters: &filters,
        };
        let (sql, bound) = build_query(&spec, params)?;

        let mut rows = conn.query(&sql, bound).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_session(&row)?);
        }
        Ok(out)
    }
}
