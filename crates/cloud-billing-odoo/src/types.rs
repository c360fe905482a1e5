//! Request and response types for the Odoo metered billing API.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use cloud_billing_core::{BillingRecord, TimeRange};

/// A billing record in the wire format of the metered billing API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteredBillingRecord {
    /// Product id.
    pub product_id: String,
    /// Instance id the sink deduplicates on.
    pub instance_id: String,
    /// Line item description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub item_description: String,
    /// Line item group description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub item_group_description: String,
    /// Sales order the usage is billed against.
    pub sales_order_id: String,
    /// Unit of measure id.
    pub unit_id: String,
    /// Consumed quantity.
    pub consumed_units: f64,
    /// Window as `<from>/<to>` in RFC 3339.
    pub timerange: String,
}

impl From<&BillingRecord> for MeteredBillingRecord {
    fn from(record: &BillingRecord) -> Self {
        Self {
            product_id: record.product_id.to_string(),
            instance_id: record.instance_id.to_string(),
            item_description: record.item_description.clone(),
            item_group_description: record.item_group_description.clone(),
            sales_order_id: record.billing_party.clone(),
            unit_id: record.unit_id.clone(),
            consumed_units: record.consumed_units,
            timerange: format_time_range(&record.time_range),
        }
    }
}

/// Format a window as `<from>/<to>`.
#[must_use]
pub fn format_time_range(range: &TimeRange) -> String {
    format!(
        "{}/{}",
        range.from.to_rfc3339_opts(SecondsFormat::Secs, true),
        range.to.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Batch of records as posted to the billing API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRecordsRequest {
    /// Records in the batch.
    pub data: Vec<MeteredBillingRecord>,
}

/// OAuth2 token response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

/// OAuth2 error response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    /// Error code.
    pub error: String,
    /// Human readable description.
    #[serde(default)]
    pub error_description: Option<String>,
}
