//! Application state.

use std::sync::Arc;

use crate::metrics::CollectorMetrics;

/// State shared with the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Collector counters.
    pub metrics: Arc<CollectorMetrics>,

    /// Name of the running job.
    pub job: &'static str,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(metrics: Arc<CollectorMetrics>, job: &'static str) -> Self {
        Self { metrics, job }
    }
}
