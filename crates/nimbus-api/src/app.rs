//! Application builder and server loop.

use tokio::sync::watch;

use nimbus_core::error::AppError;

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application.
pub fn build_app(state: AppState) -> axum::Router {
    build_router(state)
}

/// Serves the API until `shutdown` flips to `true`.
pub async fn serve(state: AppState, mut shutdown: watch::Receiver<bool>) -> Result<(), AppError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Nimbus API listening on {}", addr);

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    tracing::info!("Nimbus API stopped");
    Ok(())
}
