//! Client error types.

/// Errors that can occur when talking to the Odoo metered billing API.
#[derive(Debug, thiserror::Error)]
pub enum OdooError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint rejected the client credentials.
    #[error("authentication failed: {status} - {message}")]
    Auth {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The billing API returned a non-success response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
