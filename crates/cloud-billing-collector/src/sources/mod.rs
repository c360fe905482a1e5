//! External sources the collector reads from.
//!
//! Each source sits behind a trait so runs can be exercised against
//! in-memory fakes:
//!
//! - [`InventorySource`]: namespaces and managed resources in the cluster
//! - [`UsageSource`]: provider usage per zone
//! - [`BillingPartyLookup`]: organization to sales order

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cloud_billing_core::{ClusterObject, ResourceKind, TimeRange, UsageReading};

use crate::error::SourceError;

pub mod cloudscale;
pub mod exoscale;
pub mod kubernetes;
pub mod prometheus;

pub use cloudscale::{BucketMeter, CloudscaleClient, CloudscaleUsage, SharedBucketMetrics};
pub use exoscale::{ExoscaleClient, ExoscaleCredentials, ExoscaleDbaasUsage, ExoscaleSosUsage};
pub use kubernetes::KubernetesClient;
pub use prometheus::PrometheusClient;

/// Cluster inventory.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Map of namespace name to the organization that owns it.
    ///
    /// Namespaces without an organization are left out.
    async fn namespace_organizations(&self) -> Result<HashMap<String, String>, SourceError>;

    /// All objects of a kind. A kind the cluster does not serve yields an
    /// empty list.
    async fn list_objects(&self, kind: ResourceKind) -> Result<Vec<ClusterObject>, SourceError>;
}

/// Provider usage.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Usage readings for one zone, or account-wide when `zone` is `None`.
    async fn list_usage(
        &self,
        zone: Option<&str>,
        window: &TimeRange,
    ) -> Result<Vec<UsageReading>, SourceError>;
}

/// Billing party (sales order) lookup.
#[async_trait]
pub trait BillingPartyLookup: Send + Sync {
    /// Sales order id for an organization as of `at`.
    async fn billing_party(
        &self,
        organization: &str,
        at: DateTime<Utc>,
    ) -> Result<String, SourceError>;
}

/// Read an error body into a [`SourceError::Api`].
pub(crate) async fn api_error(source_name: &'static str, response: reqwest::Response) -> SourceError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    SourceError::Api {
        source_name,
        status: status.as_u16(),
        message: if message.is_empty() {
            format!("HTTP {status}")
        } else {
            message
        },
    }
}

/// Decode a JSON body, tagging failures with the source name.
pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
    source_name: &'static str,
    response: reqwest::Response,
) -> Result<T, SourceError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode {
        source_name,
        message: e.to_string(),
    })
}
