//! Liveness endpoint for hosting platforms that probe an HTTP port.

use axum::{Router, response::IntoResponse, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Body of every liveness response.
pub const HEALTH_BODY: &str = "OK - Bot is running";

/// Build the router: `/`, `/health` and `/ping` answer 200, anything else 404.
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/ping", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn health() -> impl IntoResponse {
    HEALTH_BODY
}

/// Serve the health router on `0.0.0.0:port` until the process exits.
pub async fn serve(port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Health server started");
    axum::serve(listener, health_routes()).await
}
