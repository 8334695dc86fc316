//! Axum-based HTTP server.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::pipeline::pipeline_handler;
use crate::state::GatewayState;
use crate::token::{register_call_handler, web_call_handler};
use crate::track::track_handler;

/// Listener and router options taken from the `gateway` config section.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub bind: String,
    pub port: u16,
    pub ui_enabled: bool,
    pub max_upload_bytes: usize,
}

/// Build the API router. Exposed separately so tests can drive it in-process.
pub fn app(state: Arc<GatewayState>, max_upload_bytes: usize) -> Router {
    let router = Router::new()
        .route("/api", post(pipeline_handler))
        .route("/api/retell/token", post(web_call_handler))
        .route("/api/retell/register", post(register_call_handler))
        .route("/api/track", post(track_handler))
        .route("/health", get(health_handler));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(crate::metrics::metrics_handler));

    router
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// When `ui_enabled` is true, the embedded browser UI is served at `/`.
pub async fn start_gateway(state: Arc<GatewayState>, options: ServeOptions) -> anyhow::Result<()> {
    let ServeOptions {
        bind,
        port,
        ui_enabled,
        max_upload_bytes,
    } = options;

    // API routes are registered first so they take priority over the UI catch-all
    let mut app = app(state, max_upload_bytes);

    if ui_enabled {
        app = app.merge(voxrelay_web::ui_router());
        info!("Browser UI available at http://{bind}:{port}/");
    }

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");

    axum::Json(json!({
        "status": "ok",
        "version": version,
        "pipeline": state.pipeline.is_some(),
        "retell": state.voice_agent.is_some(),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
