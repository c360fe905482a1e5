//! Prometheus instant-query client.
//!
//! Used for two lookups: the sales order of an organization, and the number
//! of SPKS instances per service level.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{api_error, decode, BillingPartyLookup};
use crate::error::SourceError;

const SOURCE: &str = "prometheus";

/// Label carrying the sales order on the organization info metric.
pub const SALES_ORDER_LABEL: &str = "sales_order";

/// One sample of an instant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Series labels.
    pub metric: HashMap<String, String>,
    /// Sample value.
    pub value: f64,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<RawSample>,
}

#[derive(Debug, Deserialize)]
struct RawSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

/// Prometheus HTTP API client.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: Client,
    base_url: String,
}

impl PrometheusClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Evaluate an instant query at `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, Prometheus reports an error,
    /// or the result is not an instant vector.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<Sample>, SourceError> {
        let time = at.timestamp().to_string();
        let response = self
            .client
            .get(format!("{}/api/v1/query", self.base_url))
            .query(&[("query", query), ("time", time.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(SOURCE, response).await);
        }

        let body: QueryResponse = decode(SOURCE, response).await?;
        if body.status != "success" {
            return Err(SourceError::Api {
                source_name: SOURCE,
                status: 200,
                message: body.error.unwrap_or(body.status),
            });
        }

        let data = body.data.ok_or_else(|| SourceError::Decode {
            source_name: SOURCE,
            message: "response has no data".into(),
        })?;
        if data.result_type != "vector" {
            return Err(SourceError::Decode {
                source_name: SOURCE,
                message: format!("expected a vector result, got {}", data.result_type),
            });
        }

        data.result
            .into_iter()
            .map(|raw| {
                let value = raw.value.1.parse::<f64>().map_err(|e| SourceError::Decode {
                    source_name: SOURCE,
                    message: format!("sample value {:?}: {e}", raw.value.1),
                })?;
                Ok(Sample {
                    metric: raw.metric,
                    value,
                })
            })
            .collect()
    }

    /// Count SPKS instances of a kind and service level over the day
    /// ending at `at`. No sample counts as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_instances(
        &self,
        kind: &str,
        service_level: &str,
        at: DateTime<Utc>,
    ) -> Result<f64, SourceError> {
        let samples = self.query(&instance_count_query(kind, service_level), at).await?;
        Ok(samples.first().map_or(0.0, |sample| sample.value))
    }
}

#[async_trait]
impl BillingPartyLookup for PrometheusClient {
    async fn billing_party(
        &self,
        organization: &str,
        at: DateTime<Utc>,
    ) -> Result<String, SourceError> {
        let samples = self.query(&organization_info_query(organization), at).await?;

        let sales_order = samples
            .iter()
            .find_map(|sample| sample.metric.get(SALES_ORDER_LABEL))
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("sales order of {organization}")))?;

        debug!(organization, sales_order = %sales_order, "Resolved billing party");
        Ok(sales_order)
    }
}

/// Query for the organization info series.
#[must_use]
pub fn organization_info_query(organization: &str) -> String {
    format!(
        "appuio_control_organization_info{{organization=\"{}\"}}",
        escape_label_value(organization)
    )
}

/// Query counting instances of a composite kind for a service level.
#[must_use]
pub fn instance_count_query(kind: &str, service_level: &str) -> String {
    format!(
        "count(max_over_time(crossplane_resource_info{{kind=\"{}\", service_level=\"{}\"}}[1d:1d]))",
        escape_label_value(kind),
        escape_label_value(service_level)
    )
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
