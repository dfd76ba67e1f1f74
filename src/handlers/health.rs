use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub backend: String,
}

/// Simple health check endpoint.
///
/// Used by load balancers and monitoring. Pings the store as well: if storage is down
/// the service can't do anything useful, so we say so with a 503.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, storage) = match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "Connected"),
        Err(e) => {
            tracing::warn!(error = ?e, "health check could not reach storage");
            (StatusCode::SERVICE_UNAVAILABLE, "Disconnected")
        }
    };

    let response = HealthResponse {
        status: if code.is_success() { "Healthy" } else { "Degraded" }.to_string(),
        storage: storage.to_string(),
        backend: state.db.backend_name().to_string(),
    };

    (code, Json(response))
}
