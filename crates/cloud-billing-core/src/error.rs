//! Error types for the billing core.

use crate::ids::IdError;
use crate::units::{Measure, UnitOfMeasure};

/// Result type for billing core operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur while building billing records.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// The configured unit cannot express the product's measurement.
    #[error("unsupported unit {unit} for {measure:?} measured product {product}")]
    UnsupportedUnit {
        /// Product slug the unit was configured for.
        product: String,
        /// The configured unit.
        unit: UnitOfMeasure,
        /// What the provider reports for this product.
        measure: Measure,
    },

    /// Unknown unit name in configuration.
    #[error("unknown unit of measure: {0}")]
    UnknownUnit(String),

    /// A usage reading lacks a field needed to build the product id.
    #[error("usage reading {resource} is missing {field}")]
    IncompleteUsage {
        /// The resource the reading belongs to.
        resource: String,
        /// The missing field.
        field: &'static str,
    },

    /// The billing window could not be computed for the reference instant.
    #[error("invalid billing window: {0}")]
    InvalidWindow(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BillingError {
    /// Whether the error is a data anomaly confined to a single resource.
    ///
    /// Such errors skip the affected resource; everything else fails the run.
    #[must_use]
    pub fn is_per_resource(&self) -> bool {
        matches!(self, Self::IncompleteUsage { .. } | Self::InvalidId(_))
    }
}
