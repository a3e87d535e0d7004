//! `/test_sets*` routes (§4.5.4): the operator-facing package repository —
//! list available, upload, delete.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Json;
use futures_util::stream;
use serde_json::Value;

use crate::error::AppError;
use crate::middleware::{authenticate, verify_body_digest};
use crate::repository::{archive, fs as repo_fs, manifest};
use crate::signature::Role;
use crate::state::AppState;

pub async fn list_available(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    let reader = state.repository_lock.acquire_reader().await?;
    let listing = state.repository_cache.list().await;
    reader.release().await?;
    Ok(Json(listing?))
}

/// Parses the already-buffered raw body as `multipart/form-data` and pulls
/// out the `packages` field. The body is buffered once, up front, so its
/// bytes can also serve the `Digest` verification against the *whole*
/// request body rather than just this one field.
async fn extract_archive_field(body: Bytes, content_type: &str) -> Result<Vec<u8>, AppError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| AppError::UnsupportedMediaType(format!("expected multipart/form-data: {e}")))?;
    let body_stream = stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Malformed(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("packages") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Malformed(format!("invalid multipart body: {e}")))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(AppError::Malformed("missing packages field".into()))
}

async fn unpack_and_refresh(state: &AppState, archive_bytes: Vec<u8>) -> Result<Vec<String>, AppError> {
    let names = archive::unpack(&state.tests_dir, archive_bytes).await?;
    for name in &names {
        let entry = manifest::read(&repo_fs::package_path(&state.tests_dir, name), name).await?;
        let entry_json = serde_json::to_value(&entry).map_err(|e| AppError::CoordinatorBug(e.to_string()))?;
        state.repository_cache.put(name, &entry_json).await?;
    }
    Ok(names)
}

pub async fn upload(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    verify_body_digest(&headers, &body)?;
    authenticate(&state.keyring, Role::Client, &method, &uri, &headers, &["digest"])?;

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::UnsupportedMediaType("missing Content-Type header".into()))?;
    let archive_bytes = extract_archive_field(body, content_type).await?;

    let writer = state.repository_lock.acquire_writer().await?;
    let outcome = unpack_and_refresh(&state, archive_bytes).await;
    writer.release().await?;
    outcome?;

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_package_inner(state: &AppState, name: &str) -> Result<(), AppError> {
    if !repo_fs::package_exists(&state.tests_dir, name).await {
        return Err(AppError::NotFound(format!("package {name}")));
    }
    repo_fs::remove_package(&state.tests_dir, name).await?;
    state.repository_cache.remove(name).await?;
    Ok(())
}

pub async fn delete_package(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    authenticate(&state.keyring, Role::Client, &method, &uri, &headers, &[])?;

    let writer = state.repository_lock.acquire_writer().await?;
    let outcome = delete_package_inner(&state, &name).await;
    writer.release().await?;
    outcome?;

    Ok(StatusCode::NO_CONTENT)
}
