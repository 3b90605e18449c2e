//! HTTP surface
//!
//! A passive shell around the relay supervisor: one placeholder endpoint
//! that shares no state with the supervisor and reports nothing about it.

use axum::{response::IntoResponse, routing::get, Json, Router};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Build the application router
pub fn router() -> Router {
    Router::new().route("/process", get(process_handler))
}

/// Placeholder processing endpoint
///
/// Responds identically whether the relay connection is up, reconnecting,
/// or was never established.
async fn process_handler() -> impl IntoResponse {
    debug!("Processing request...");
    Json(serde_json::json!({ "message": "Processing request..." }))
}

/// Serve the HTTP surface until a shutdown signal is received
pub async fn serve(addr: &str, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, router())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, stopping HTTP server");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_process_handler_body() {
        let response = process_handler().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "message": "Processing request..." })
        );
    }
}
