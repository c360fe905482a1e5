//! Route configuration.

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, metrics};
use crate::state::AppState;

/// Upper bound for a scrape.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the router for the metrics endpoint.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
