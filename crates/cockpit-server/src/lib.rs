pub mod error;
pub mod routes;
pub mod signature;
pub mod state;

use std::path::Path;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with the webhook, health and stats routes.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let webhook = Router::new()
        .route(
            "/webhook",
            get(routes::webhook::verify).post(routes::webhook::receive),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            signature::require_signature,
        ));

    Router::new()
        .merge(webhook)
        .route("/api/health", get(routes::health::health))
        .route("/api/stats/{month}", get(routes::stats::month_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the webhook server for the workspace at `root`.
///
/// `port` overrides `server.port` from the config file when given.
pub async fn serve(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let app_state = AppState::from_root(root)?;
    let server = &app_state.pipeline.config().server;
    let addr = format!("{}:{}", server.host, port.unwrap_or(server.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener).await
}

/// Start the webhook server on a pre-bound listener.
///
/// Lets the caller read the actual port before starting (useful when
/// `port = 0` and the OS picks a free port).
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let model = app_state.pipeline.config().claude.model.clone();
    let app = build_router(app_state);

    tracing::info!(port = actual_port, model = %model, "cockpit listening");

    axum::serve(listener, app).await?;
    Ok(())
}
