//! HTTP-facing error taxonomy (§7). Every component-local error converts
//! into [`AppError`] at the handler boundary; none are restringified, the
//! structured variant is kept all the way to the response body.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::cache::CacheError;
use crate::repository::RepoError;
use crate::signature::SignatureError;
use secchiware_store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("coordinator bug: {0}")]
    CoordinatorBug(String),

    #[error("upstream returned an unexpected status: {0}")]
    UpstreamUnexpected(String),

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::MalformedDigest | SignatureError::DigestMismatch => {
                AppError::Malformed(err.to_string())
            }
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidParameter(msg) => AppError::Malformed(msg),
            StoreError::SessionNotFound(id) => AppError::NotFound(format!("session {id}")),
            StoreError::ExecutionNotFound(id) => AppError::NotFound(format!("execution {id}")),
            StoreError::SessionStillActive(id) => {
                AppError::Malformed(format!("session {id} is still active"))
            }
            other => AppError::CoordinatorBug(other.to_string()),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::CoordinatorBug(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::InvalidRequest(msg) => AppError::Malformed(msg),
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::InvalidFile(msg) => AppError::Malformed(msg),
            RepoError::Io(msg) => AppError::CoordinatorBug(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Malformed(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::UnsupportedMediaType(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone())
            }
            AppError::CoordinatorBug(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::UpstreamUnexpected(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::UpstreamUnreachable(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
        };

        let body = json!({ "error": message });

        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                [(
                    header::WWW_AUTHENTICATE,
                    "SECCHIWARE-HMAC-256 realm=\"Access to C2\"",
                )],
                axum::Json(body),
            )
                .into_response();
        }

        (status, axum::Json(body)).into_response()
    }
}
