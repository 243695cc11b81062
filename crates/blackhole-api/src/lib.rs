pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// The full application: every route under `/api`, CORS open.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/downonly/status", get(handlers::handle_status))
        .route("/downonly/toggle", post(handlers::handle_toggle))
        .route("/downonly/speed", get(handlers::handle_speed))
        .route("/downonly/history", get(handlers::handle_history))
        .route("/downonly/logs", get(handlers::handle_logs))
        .route(
            "/downonly/config",
            get(handlers::handle_config_get).post(handlers::handle_config_update),
        )
        .route("/monitor/interfaces", get(handlers::handle_interfaces))
        .route(
            "/monitor/stats/{iface}",
            get(handlers::handle_interface_stats),
        )
        .route(
            "/monitor/history/{iface}",
            get(handlers::handle_interface_history),
        )
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Bind `bind:port` and serve until `shutdown` fires.
pub async fn serve(
    state: ApiState,
    bind: &str,
    port: u16,
    shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind((bind, port)).await?;
    tracing::info!(bind, port, "API listening");
    serve_on(listener, state, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` fires.
pub async fn serve_on(
    listener: TcpListener,
    state: ApiState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("API shutting down");
        })
        .await?;
    Ok(())
}
