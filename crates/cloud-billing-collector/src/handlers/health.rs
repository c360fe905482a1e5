//! Health check handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Running job.
    pub job: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "billing-collector",
        job: state.job,
        version: env!("CARGO_PKG_VERSION"),
    })
}
