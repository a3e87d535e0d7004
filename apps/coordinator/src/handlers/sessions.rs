//! `/sessions*` routes (§4.5.3): search, detail, delete.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Json;
use indexmap::IndexMap;

use secchiware_store::{Session, SessionRepository};

use crate::error::AppError;
use crate::middleware::authenticate;
use crate::signature::Role;
use crate::state::AppState;

/// The `/sessions` search shape: a summary row carrying the platform's OS
/// name rather than the full `platform_info` blob returned by `detail`.
#[derive(Debug, serde::Serialize)]
struct SessionSummary {
    session_id: i64,
    session_start: String,
    ip: String,
    port: u16,
    platform_os_system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_end: Option<String>,
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        let platform_os_system = session
            .platform_info
            .get("os")
            .and_then(|os| os.get("system"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Self {
            session_id: session.id,
            session_start: session.session_start,
            ip: session.env_ip,
            port: session.env_port,
            platform_os_system,
            session_end: session.session_end,
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<IndexMap<String, String>>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    let conn = state.store.connection().await?;
    let sessions = SessionRepository::search(&conn, &params).await?;
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

pub async fn detail(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Session>, AppError> {
    let conn = state.store.connection().await?;
    Ok(Json(SessionRepository::get(&conn, id).await?))
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
    SessionRepository::delete(&conn, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
