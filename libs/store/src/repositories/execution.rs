use std::collections::HashMap;

use indexmap::IndexMap;
use libsql::{params, Connection, Row};

use crate::errors::StoreError;
use crate::models::{Execution, NewReport};
use crate::search::{build_query, SearchSpec};

const SELECT_COLUMNS: &str = "id, fk_session, timestamp_registered";

fn row_to_execution(row: &Row) -> Result<Execution, StoreError> {
    Ok(Execution {
        id: row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?,
        fk_session: row.get(1).map_err(|e| StoreError::Mapping(e.to_string()))?,
        timestamp_registered: row.get(2).map_err(|e| StoreError::Mapping(e.to_string()))?,
    })
}

pub struct ExecutionRepository;

impl ExecutionRepository {
    pub async fn insert(conn: &Connection, fk_session: i64) -> Result<Execution, StoreError> {
        conn.execute(
            "INSERT INTO execution (fk_session) VALUES (?1)",
            params![fk_session],
        )
        .await?;
        let id = conn.last_insert_rowid();
        Self::get(conn, id).await
    }

    /// Inserts an execution together with every report it produced, all
    /// within a single transaction: a crash partway through never leaves an
    /// execution row with zero reports.
    pub async fn insert_with_reports(
        conn: &Connection,
        fk_session: i64,
        reports: &[NewReport],
    ) -> Result<Execution, StoreError> {
        let tx = conn
            .transaction()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tx.execute(
            "INSERT INTO execution (fk_session) VALUES (?1)",
            params![fk_session],
        )
        .await?;
        let id = tx.last_insert_rowid();

        for report in reports {
            let additional_text = report
                .additional_info
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| StoreError::Mapping(e.to_string()))?;

            tx.execute(
                "INSERT INTO report (fk_execution, test_name, test_description, timestamp_start, timestamp_end, result_code, additional_info) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    report.test_name.as_str(),
                    report.test_description.as_str(),
                    report.timestamp_start.as_str(),
                    report.timestamp_end.as_str(),
                    report.result_code,
                    additional_text
                ],
            )
            .await?;
        }

        let mut rows = tx
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM execution WHERE id = ?1"),
                params![id],
            )
            .await?;
        let row = rows.next().await?.ok_or(StoreError::ExecutionNotFound(id))?;
        let execution = row_to_execution(&row)?;

        tx.commit().await.map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(execution)
    }

    pub async fn get(conn: &Connection, id: i64) -> Result<Execution, StoreError> {
        let mut rows = conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM execution WHERE id = ?1"),
                params![id],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or(StoreError::ExecutionNotFound(id))?;
        row_to_execution(&row)
    }

    pub async fn list_for_session(
        conn: &Connection,
        fk_session: i64,
    ) -> Result<Vec<Execution>, StoreError> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM execution WHERE fk_session = ?1 ORDER BY id"
                ),
                params![fk_session],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_execution(&row)?);
        }
        Ok(out)
    }

    pub async fn delete(conn: &Connection, id: i64) -> Result<(), StoreError> {
        Self::get(conn, id).await?;
        conn.execute("DELETE FROM execution WHERE id = ?1", params![id])
            .await?;
        Ok(())
    }

    pub async fn search(
        conn: &Connection,
        params: &IndexMap<String, String>,
    ) -> Result<Vec<Execution>, StoreError> {
        let mut order_by = HashMap::new();
        order_by.insert("id", "id");
        order_by.insert("registered", "timestamp_registered");

        let mut filters = HashMap::new();
        filters.insert("session", ("fk_session", "="));

        let spec = SearchSpec {
            table: "execution",
            select: SELECT_COLUMNS,
            order_by: &order_by,
            filters: &filters,
        };
        let (sql, bound) = build_query(&spec, params)?;

        let mut rows = conn.query(&sql, bound).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_execution(&row)?);
        }
        Ok(out)
    }
}
