//! Collector error types.

use cloud_billing_core::BillingError;
use cloud_billing_odoo::OdooError;

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Errors raised by an external source (Kubernetes, Exoscale, cloudscale,
/// Prometheus).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The source returned a non-success response.
    #[error("{source_name} returned {status}: {message}")]
    Api {
        /// Which source answered.
        source_name: &'static str,
        /// HTTP status code.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode {source_name} response: {message}")]
    Decode {
        /// Which source answered.
        source_name: &'static str,
        /// Decoder message.
        message: String,
    },

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The lookup succeeded but found nothing.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors that fail a collector run or prevent startup.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Fetching inventory or usage failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Record synthesis failed for the whole batch.
    #[error("billing error: {0}")]
    Billing(#[from] BillingError),

    /// The billing sink rejected or did not receive the batch.
    #[error("sink error: {0}")]
    Sink(#[from] OdooError),

    /// I/O error (token files, listener).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectorError {
    /// Whether the error stems from a provider or inventory call.
    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}
