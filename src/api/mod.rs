//! HTTP API over the pipeline.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::pipeline::Pipeline;
use self::handlers::*;

pub use error::ApiError;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Builds the API router.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/v1/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .route(
            "/v1/haproxy/section/",
            get(list_sections).post(create_section),
        )
        .route(
            "/v1/haproxy/section/{checksum}/",
            get(get_section).put(touch_section).delete(delete_section),
        )
        .route(
            "/v1/haproxy/configuration/",
            get(preview_configuration).post(generate_configuration),
        )
        .route(
            "/v1/haproxy/configuration/validate/",
            post(validate_configuration),
        )
        .route(
            "/v1/haproxy/configuration/deploy/",
            post(deploy_configuration),
        )
        .with_state(AppState { pipeline })
        .layer(TraceLayer::new_for_http())
}

/// Serves the API on `listener` until Ctrl+C.
pub async fn serve(listener: TcpListener, pipeline: Arc<Pipeline>) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP API starting");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
