//! Graceful shutdown (§4.5.5): on SIGTERM/SIGINT, notify every node with an
//! active session, end all active sessions, flush their cache namespaces,
//! and only then let the HTTP listener stop accepting work.

use tokio::signal;
use tracing::{error, info, warn};

use secchiware_store::SessionRepository;

use crate::state::AppState;

async fn wait_for_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Awaits a shutdown signal, then runs the shutdown sequence. Returns once
/// it is safe for `axum::serve`'s graceful shutdown to stop accepting new
/// connections.
pub async fn signal(state: AppState) {
    wait_for_signal().await;
    info!("shutdown signal received, notifying active nodes");

    let conn = match state.store.connection().await {
        Ok(conn) => conn,
        Err(e) => {
            error!(error = %e, "failed to acquire a store connection during shutdown");
            return;
        }
    };

    let active = match SessionRepository::list_active(&conn).await {
        Ok(sessions) => sessions,
        Err(e) => {
            error!(error = %e, "failed to list active sessions during shutdown");
            Vec::new()
        }
    };

    for session in &active {
        let ip = &session.env_ip;
        let port = session.env_port;

        match state.node_client.notify_shutdown(ip, port).await {
            Ok(response) if !response.status().is_success() => {
                warn!(
                    ip, port, status = %response.status(),
                    "node returned an unexpected status to the shutdown notification"
                );
            }
            Err(e) => {
                warn!(ip, port, error = %e, "node unreachable during shutdown notification");
            }
            _ => {}
        }

        if let Err(e) = state.environment_cache.clear(ip, port).await {
            warn!(ip, port, error = %e, "failed to flush cache namespace during shutdown");
        }
    }

    if let Err(e) = SessionRepository::end_all_active(&conn).await {
        error!(error = %e, "failed to end active sessions during shutdown");
    }

    info!("shutdown sequence complete");
}
