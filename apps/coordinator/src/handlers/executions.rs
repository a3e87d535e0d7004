//! `/executions*` routes (§4.5.3): search (joined with reports), delete.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Json;
use indexmap::IndexMap;

use secchiware_store::{ExecutionRepository, ExecutionWithReports, ReportRepository};

use crate::error::AppError;
use crate::middleware::authenticate;
use crate::signature::Role;
use crate::state::AppState;

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<IndexMap<String, String>>,
) -> Result<Json<Vec<ExecutionWithReports>>, AppError> {
    let conn = state.store.connection().await?;
    let executions = ExecutionRepository::search(&conn, &params).await?;

    let mut out = Vec::with_capacity(executions.len());
    for execution in executions {
        let reports = ReportRepository::list_for_execution(&conn, execution.id).await?;
        out.push(ExecutionWithReports { execution, reports });
    }
    Ok(Json(out))
}

pub async fn delete(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    authenticate(&state.keyring, Role::Client, &method, &uri, &headers, &[])?;
    let conn = state.store.connection().await?;
    ExecutionRepository::delete(&conn, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
