pub mod response;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::HttpConfig;
use crate::error::AppError;
use crate::AppState;

/// Requests running past `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Build the application router.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let api_v1 = Router::new().route("/user/query", get(user::query));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(timeout_layer(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve HTTP until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(
    state: AppState,
    config: &HttpConfig,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let app = router(state, Duration::from_secs(config.request_timeout_secs));

    let addr = format!("{}:{}", config.listen, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("HTTP server shutting down");
        })
        .await?;

    Ok(())
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
        "cache_entries": state.cache.entry_count(),
    }))
}
