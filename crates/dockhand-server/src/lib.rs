pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use dockhand_core::registry::Registry;
use tower_http::trace::TraceLayer;

/// Build the axum Router with the health route and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::get_health))
        .fallback(routes::health::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the health endpoint on `0.0.0.0:{port}` until the process exits.
pub async fn serve(registry: Arc<Registry>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(registry, listener).await
}

/// Like `serve`, on a listener the caller already bound (e.g. port 0).
pub async fn serve_on(
    registry: Arc<Registry>,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    let app = build_router(state::AppState::new(registry));

    tracing::info!("health check listening on http://localhost:{port}/health");

    axum::serve(listener, app).await?;
    Ok(())
}
