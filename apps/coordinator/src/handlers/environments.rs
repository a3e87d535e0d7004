//! `/environments*` routes (§4.5.1, §4.5.2, §4.5.3): session lifecycle, the
//! per-node installed-packages view, and the reports gateway.

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use secchiware_store::{ExecutionRepository, NewReport, Session, SessionRepository};

use crate::cache::events::SessionEvent;
use crate::error::AppError;
use crate::middleware::{authenticate, verify_body_digest};
use crate::signature::Role;
use crate::state::AppState;

const ALLOWED_REPORT_QUERY_KEYS: &[&str] = &["packages", "modules", "test_sets", "tests"];

#[derive(Debug, Deserialize)]
struct RegisterBody {
    ip: String,
    port: u16,
    platform_info: Value,
}

/// The `/environments` list shape: active sessions only, so `session_end` is
/// always absent and `platform_info` is left out entirely (fetched
/// separately from `/environments/{ip}/{port}/info`).
#[derive(Debug, serde::Serialize)]
struct EnvironmentSummary {
    session_id: i64,
    ip: String,
    port: u16,
    session_start: String,
}

impl From<Session> for EnvironmentSummary {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            ip: session.env_ip,
            port: session.env_port,
            session_start: session.session_start,
        }
    }
}

pub async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<EnvironmentSummary>>, AppError> {
    let conn = state.store.connection().await?;
    let sessions = SessionRepository::list_active(&conn).await?;
    Ok(Json(sessions.into_iter().map(EnvironmentSummary::from).collect()))
}

pub async fn register(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    verify_body_digest(&headers, &body)?;
    authenticate(&state.keyring, Role::Node, &method, &uri, &headers, &["digest"])?;

    let payload: RegisterBody =
        serde_json::from_slice(&body).map_err(|e| AppError::Malformed(format!("invalid JSON body: {e}")))?;

    let conn = state.store.connection().await?;
    if let Some(prior) = SessionRepository::find_active_by_addr(&conn, &payload.ip, payload.port).await? {
        SessionRepository::end(&conn, prior.id).await?;
        state.environment_cache.clear(&payload.ip, payload.port).await?;
    }

    state.environment_cache.mark_uncached(&payload.ip, payload.port).await?;
    let session = SessionRepository::insert(&conn, &payload.ip, payload.port, &payload.platform_info).await?;

    state
        .events
        .publish(&SessionEvent::Start {
            session_id: session.id,
            session_start: session.session_start.clone(),
            ip: payload.ip,
            port: payload.port,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn deregister(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path((ip, port)): Path<(String, u16)>,
) -> Result<StatusCode, AppError> {
    authenticate(&state.keyring, Role::Node, &method, &uri, &headers, &[])?;

    let conn = state.store.connection().await?;
    let Some(ended) = SessionRepository::end_active_by_addr(&conn, &ip, port).await? else {
        return Err(AppError::NotFound(format!("no active session at {ip}:{port}")));
    };
    state.environment_cache.clear(&ip, port).await?;
    state
        .events
        .publish(&SessionEvent::Stop {
            session_id: ended.id,
            ip,
            port,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn info(
    State(state): State<AppState>,
    Path((ip, port)): Path<(String, u16)>,
) -> Result<Json<Value>, AppError> {
    let conn = state.store.connection().await?;
    let session = SessionRepository::find_active_by_addr(&conn, &ip, port)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no active session at {ip}:{port}")))?;
    Ok(Json(session.platform_info))
}

async fn fetch_and_cache_installed(state: &AppState, ip: &str, port: u16) -> Result<Vec<Value>, AppError> {
    let response = state
        .node_client
        .get_test_sets(ip, port)
        .await
        .map_err(|e| AppError::UpstreamUnreachable(format!("{e} (from node at {ip}:{port})")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::UpstreamUnexpected(format!(
            "node at {ip}:{port} returned {status}"
        )));
    }

    let manifests: Vec<Value> = response
        .json()
        .await
        .map_err(|e| AppError::UpstreamUnexpected(format!("invalid JSON from node at {ip}:{port}: {e}")))?;

    for manifest in &manifests {
        let name = manifest.get("name").and_then(|v| v.as_str()).ok_or_else(|| {
            AppError::UpstreamUnexpected(format!("manifest entry missing name (from node at {ip}:{port})"))
        })?;
        state.environment_cache.put_package(ip, port, name, manifest).await?;
    }
    state.environment_cache.mark_primed(ip, port).await?;

    Ok(manifests)
}

pub async fn list_installed(
    State(state): State<AppState>,
    Path((ip, port)): Path<(String, u16)>,
) -> Result<Json<Vec<Value>>, AppError> {
    let conn = state.store.connection().await?;
    SessionRepository::find_active_by_addr(&conn, &ip, port)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no active session at {ip}:{port}")))?;

    if state.environment_cache.is_primed(&ip, port).await? {
        return Ok(Json(state.environment_cache.list_installed(&ip, port).await?));
    }

    let guard = state.environment_mutex(&ip, port).acquire().await?;

    if state.environment_cache.is_primed(&ip, port).await? {
        let cached = state.environment_cache.list_installed(&ip, port).await?;
        guard.release().await?;
        return Ok(Json(cached));
    }

    let fetched = fetch_and_cache_installed(&state, &ip, port).await;
    guard.release().await?;
    Ok(Json(fetched?))
}

async fn install_on_node(
    state: &AppState,
    ip: &str,
    port: u16,
    archive: Vec<u8>,
    packages: &[String],
) -> Result<(), AppError> {
    let response = state
        .node_client
        .install(ip, port, archive)
        .await
        .map_err(|e| AppError::UpstreamUnreachable(format!("{e} (from node at {ip}:{port})")))?;

    match response.status().as_u16() {
        204 => {
            if state.environment_cache.is_primed(ip, port).await? {
                for name in packages {
                    if let Some(manifest) = state.repository_cache.get(name).await? {
                        state.environment_cache.put_package(ip, port, name, &manifest).await?;
                    }
                }
            }
            Ok(())
        }
        400 | 401 | 415 => Err(AppError::CoordinatorBug(format!(
            "node at {ip}:{port} rejected an install request the coordinator constructed"
        ))),
        other => Err(AppError::UpstreamUnexpected(format!(
            "node at {ip}:{port} returned {other}"
        ))),
    }
}

pub async fn install(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path((ip, port)): Path<(String, u16)>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    verify_body_digest(&headers, &body)?;
    authenticate(&state.keyring, Role::Client, &method, &uri, &headers, &["digest"])?;

    let packages: Vec<String> =
        serde_json::from_slice(&body).map_err(|e| AppError::Malformed(format!("invalid JSON body: {e}")))?;

    let conn = state.store.connection().await?;
    SessionRepository::find_active_by_addr(&conn, &ip, port)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no active session at {ip}:{port}")))?;

    let reader = state.repository_lock.acquire_reader().await?;
    let archive = crate::repository::archive::pack(&state.tests_dir, &packages).await;
    reader.release().await?;
    let archive = archive?;

    let env_guard = state.environment_mutex(&ip, port).acquire().await?;
    let outcome = install_on_node(&state, &ip, port, archive, &packages).await;
    env_guard.release().await?;
    outcome?;

    Ok(StatusCode::NO_CONTENT)
}

async fn uninstall_on_node(state: &AppState, ip: &str, port: u16, package: &str) -> Result<(), AppError> {
    let response = state
        .node_client
        .uninstall(ip, port, package)
        .await
        .map_err(|e| AppError::UpstreamUnreachable(format!("{e} (from node at {ip}:{port})")))?;

    match response.status().as_u16() {
        204 => {
            if state.environment_cache.is_primed(ip, port).await? {
                state.environment_cache.remove_package(ip, port, package).await?;
            }
            Ok(())
        }
        401 | 404 => Err(AppError::NotFound(format!(
            "package {package} not installed on node at {ip}:{port}"
        ))),
        other => Err(AppError::UpstreamUnexpected(format!(
            "node at {ip}:{port} returned {other}"
        ))),
    }
}

pub async fn uninstall(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path((ip, port, package)): Path<(String, u16, String)>,
) -> Result<StatusCode, AppError> {
    authenticate(&state.keyring, Role::Client, &method, &uri, &headers, &[])?;
    crate::repository::fs::validate_name(&package)?;

    let conn = state.store.connection().await?;
    SessionRepository::find_active_by_addr(&conn, &ip, port)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no active session at {ip}:{port}")))?;

    let env_guard = state.environment_mutex(&ip, port).acquire().await?;
    let outcome = uninstall_on_node(&state, &ip, port, &package).await;
    env_guard.release().await?;
    outcome?;

    Ok(StatusCode::NO_CONTENT)
}

fn validate_report_query(query: Option<&str>) -> Result<(), AppError> {
    let Some(query) = query else { return Ok(()) };
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let key = pair.split('=').next().unwrap_or("");
        if !ALLOWED_REPORT_QUERY_KEYS.contains(&key) {
            return Err(AppError::Malformed(format!("unsupported query parameter {key}")));
        }
    }
    Ok(())
}

pub async fn get_reports(
    State(state): State<AppState>,
    Path((ip, port)): Path<(String, u16)>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    validate_report_query(query.as_deref())?;

    let conn = state.store.connection().await?;
    let session = SessionRepository::find_active_by_addr(&conn, &ip, port)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no active session at {ip}:{port}")))?;

    let response = state
        .node_client
        .get_reports(&ip, port, query.as_deref())
        .await
        .map_err(|e| AppError::UpstreamUnreachable(format!("{e} (from node at {ip}:{port})")))?;

    let status = response.status();
    match status.as_u16() {
        400 => {
            return Err(AppError::CoordinatorBug(format!(
                "node at {ip}:{port} rejected a reports request the coordinator constructed"
            )))
        }
        404 => return Err(AppError::NotFound(format!("from node at {ip}:{port}"))),
        _ if !status.is_success() => {
            return Err(AppError::UpstreamUnexpected(format!(
                "node at {ip}:{port} returned {status}"
            )))
        }
        _ => {}
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| AppError::UpstreamUnexpected(format!("invalid JSON from node at {ip}:{port}: {e}")))?;
    let reports_json = body
        .as_array()
        .ok_or_else(|| AppError::UpstreamUnexpected(format!("node at {ip}:{port} did not return a JSON array")))?;

    let new_reports: Vec<NewReport> = reports_json
        .iter()
        .cloned()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
        .map_err(|e| AppError::UpstreamUnexpected(format!("malformed report from node at {ip}:{port}: {e}")))?;

    ExecutionRepository::insert_with_reports(&conn, session.id, &new_reports).await?;

    Ok(Json(body))
}
