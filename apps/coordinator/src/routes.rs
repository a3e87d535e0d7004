//! Route table assembly (§6). Grouped by prefix, matching the handler
//! modules; cross-cutting middleware (tracing, CORS, panic isolation, body
//! size limit) is layered once over the whole router.

use axum::routing::{delete, get};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{environments, events, executions, repository, sessions};
use crate::state::AppState;

/// Packages are assumed to fit comfortably in memory (§1 Non-goals rule out
/// streaming transport of arbitrarily large payloads); this bounds a
/// pathological upload from exhausting memory before that assumption is
/// even checked.
const MAX_BODY_BYTES: usize = 128 * 1024 * 1024;

pub fn build(state: AppState) -> Router {
    let environments_routes = Router::new()
        .route("/environments", get(environments::list_active).post(environments::register))
        .route("/environments/:ip/:port", delete(environments::deregister))
        .route("/environments/:ip/:port/info", get(environments::info))
        .route(
            "/environments/:ip/:port/installed",
            get(environments::list_installed).patch(environments::install),
        )
        .route(
            "/environments/:ip/:port/installed/:pkg",
            delete(environments::uninstall),
        )
        .route("/environments/:ip/:port/reports", get(environments::get_reports));

    let session_routes = Router::new()
        .route("/sessions", get(sessions::search))
        .route("/sessions/:id", get(sessions::detail).delete(sessions::delete));

    let execution_routes = Router::new()
        .route("/executions", get(executions::search))
        .route("/executions/:id", delete(executions::delete));

    let repository_routes = Router::new()
        .route("/test_sets", get(repository::list_available).patch(repository::upload))
        .route("/test_sets/:pkg", delete(repository::delete_package));

    let event_routes = Router::new().route("/events", get(events::subscribe));

    Router::new()
        .merge(environments_routes)
        .merge(session_routes)
        .merge(execution_routes)
        .merge(repository_routes)
        .merge(event_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
