pub mod request_id;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::controllers::{
    conversion::ConversionController, health, history::HistoryController,
};
use crate::infrastructure::config::Config;
use crate::infrastructure::storage::StorageQuota;
use request_id::request_id_middleware;

/// Uploaded documents can be sizeable; PDFs especially
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Assemble the application router with all routes configured
pub fn build_router(
    conversion_controller: Arc<ConversionController>,
    history_controller: Arc<HistoryController>,
    storage: Arc<StorageQuota>,
) -> Router {
    let conversion_routes = Router::new()
        .route("/api/convert", post(ConversionController::start_conversion))
        .route("/api/status/:job_id", get(ConversionController::get_status))
        .route("/api/voices", get(ConversionController::get_voices))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(conversion_controller);

    let history_routes = Router::new()
        .route("/api/result/:id", get(HistoryController::get_result))
        .route("/api/audio/:id", get(HistoryController::get_audio))
        .route("/api/history", get(HistoryController::get_history))
        .route(
            "/api/history/:id",
            get(HistoryController::get_history_detail).delete(HistoryController::delete_history),
        )
        .with_state(history_controller);

    Router::new()
        .route("/health", get(health::health))
        .with_state(storage)
        .merge(conversion_routes)
        .merge(history_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    conversion_controller: Arc<ConversionController>,
    history_controller: Arc<HistoryController>,
    storage: Arc<StorageQuota>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(conversion_controller, history_controller, storage);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
