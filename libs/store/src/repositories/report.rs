use libsql::{params, Connection, Row};

use crate::errors::StoreError;
use crate::models::{NewReport, Report};

const SELECT_COLUMNS: &str = "id, fk_execution, test_name, test_description, timestamp_start, timestamp_end, result_code, additional_info";

fn row_to_report(row: &Row) -> Result<Report, StoreError> {
    let additional_raw: Option<String> = row.get(7).map_err(|e| StoreError::Mapping(e.to_string()))?;
    let additional_info = additional_raw
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| StoreError::Mapping(format!("additional_info: {e}")))?;

    Ok(Report {
        id: row.get(0).map_err(|e| StoreError::Mapping(e.to_string()))?,
        fk_execution: row.get(1).map_err(|e| StoreError::Mapping(e.to_string()))?,
        test_name: row.get(2).map_err(|e| StoreError::Mapping(e.to_string()))?,
        test_description: row.get(3).map_err(|e| StoreError::Mapping(e.to_string()))?,
        timestamp_start: row.get(4).map_err(|e| StoreError::Mapping(e.to_string()))?,
        timestamp_end: row.get(5).map_err(|e| StoreError::Mapping(e.to_string()))?,
        result_code: row.get(6).map_err(|e| StoreError::Mapping(e.to_string()))?,
        additional_info,
    })
}

pub struct ReportRepository;

impl ReportRepository {
    /// Inserts every report produced by one execution in a single
    /// transaction, so a partial crash never leaves an execution with only
    /// some of its reports persisted.
    pub async fn bulk_insert(
        conn: &Connection,
        fk_execution: i64,
        reports: &[NewReport],
    ) -> Result<(), StoreError> {
        let tx = conn
            .transaction()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

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
                    fk_execution,
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

        tx.commit().await.map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    pub async fn list_for_execution(
        conn: &Connection,
        fk_execution: i64,
    ) -> Result<Vec<Report>, StoreError> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM report WHERE fk_execution = ?1 ORDER BY timestamp_start"
                ),
                params![fk_execution],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_report(&row)?);
        }
        Ok(out)
    }
}
