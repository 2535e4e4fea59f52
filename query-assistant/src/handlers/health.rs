use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe. Reports the database state alongside the service version.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "query-assistant",
                "version": env!("CARGO_PKG_VERSION"),
                "execution_mode": state.config.assistant.execution_mode.as_str(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "query-assistant",
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness probe: the database answers and the model provider is configured.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.db.health_check().await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match state.provider.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Model provider not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
