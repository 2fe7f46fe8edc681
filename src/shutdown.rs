use std::sync::Arc;

use tokio::signal;

use crate::server::AppState;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Log what is left open on the way out. In-flight processes need no
/// cleanup: the automation keeps running and the events it emits while we
/// are down are redelivered by the sender, so reconciliation resumes where
/// it left off.
pub async fn graceful_shutdown(state: &Arc<AppState>) {
    tracing::info!("Starting graceful shutdown...");

    let pending = {
        let queue = state.event_queue.read().await;
        queue.len()
    };
    if pending > 0 {
        tracing::warn!(
            count = pending,
            "Shutting down with unprocessed events; sender redelivery will cover them"
        );
    }

    match state.store.list_unfinished().await {
        Ok(unfinished) if !unfinished.is_empty() => {
            tracing::info!(
                count = unfinished.len(),
                "Processes still unfinished at shutdown"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list unfinished processes during shutdown");
        }
    }

    tracing::info!("Graceful shutdown complete");
}
