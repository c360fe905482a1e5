//! cloudscale metrics API client for object storage buckets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use cloud_billing_core::{Product, TimeRange, UsageReading};

use super::{api_error, decode, UsageSource};
use crate::error::SourceError;

const SOURCE: &str = "cloudscale";

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.cloudscale.ch/v1";

/// Usage counters of one bucket over one interval.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BucketUsage {
    /// Number of requests.
    #[serde(default)]
    pub requests: u64,
    /// Number of stored objects.
    #[serde(default)]
    pub object_count: u64,
    /// Stored bytes.
    #[serde(default)]
    pub storage_bytes: u64,
    /// Bytes received.
    #[serde(default)]
    pub received_bytes: u64,
    /// Bytes sent.
    #[serde(default)]
    pub sent_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct TimeSeriesEntry {
    usage: BucketUsage,
}

#[derive(Debug, Clone, Deserialize)]
struct Subject {
    name: String,
}

/// Metrics of one bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketMetrics {
    subject: Subject,
    #[serde(default)]
    time_series: Vec<TimeSeriesEntry>,
}

impl BucketMetrics {
    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.subject.name
    }

    /// Usage per interval, oldest first.
    pub fn usage(&self) -> impl Iterator<Item = &BucketUsage> {
        self.time_series.iter().map(|entry| &entry.usage)
    }
}

#[derive(Debug, Deserialize)]
struct BucketMetricsResponse {
    #[serde(default)]
    data: Vec<BucketMetrics>,
}

/// cloudscale API client.
#[derive(Debug, Clone)]
pub struct CloudscaleClient {
    client: Client,
    base_url: String,
    token: String,
}

impl CloudscaleClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Bucket metrics for a single day.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with a
    /// non-success status.
    #[instrument(skip(self))]
    pub async fn bucket_metrics(&self, date: NaiveDate) -> Result<Vec<BucketMetrics>, SourceError> {
        let day = date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(format!("{}/metrics/buckets", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("start", day.as_str()), ("end", day.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(SOURCE, response).await);
        }

        let body: BucketMetricsResponse = decode(SOURCE, response).await?;
        debug!(buckets = body.data.len(), "Fetched bucket metrics");
        Ok(body.data)
    }
}

/// Bucket metrics shared by all meters, fetched once per day.
///
/// The meters of one run read the same day; only the first one calls the
/// API. Failed fetches are not kept.
#[derive(Debug)]
pub struct SharedBucketMetrics {
    client: CloudscaleClient,
    last: Mutex<Option<(NaiveDate, Arc<[BucketMetrics]>)>>,
}

impl SharedBucketMetrics {
    /// Share metrics fetched through `client`.
    #[must_use]
    pub fn new(client: CloudscaleClient) -> Self {
        Self {
            client,
            last: Mutex::new(None),
        }
    }

    /// Bucket metrics of `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics have to be fetched and the fetch fails.
    pub async fn for_day(&self, date: NaiveDate) -> Result<Arc<[BucketMetrics]>, SourceError> {
        let mut last = self.last.lock().await;
        if let Some((day, metrics)) = last.as_ref() {
            if *day == date {
                debug!(%date, "Reusing bucket metrics");
                return Ok(Arc::clone(metrics));
            }
        }

        let metrics: Arc<[BucketMetrics]> = self.client.bucket_metrics(date).await?.into();
        *last = Some((date, Arc::clone(&metrics)));
        Ok(metrics)
    }
}

/// Which counter of the bucket metrics is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketMeter {
    /// Stored bytes.
    Storage,
    /// Bytes sent out of the bucket.
    TrafficOut,
    /// Requests against the bucket.
    Requests,
}

impl BucketMeter {
    /// All meters, in billing order.
    pub const ALL: [Self; 3] = [Self::Storage, Self::TrafficOut, Self::Requests];

    /// Product the meter is billed as.
    #[must_use]
    pub const fn product(self) -> Product {
        match self {
            Self::Storage => Product::CloudscaleStorage,
            Self::TrafficOut => Product::CloudscaleTrafficOut,
            Self::Requests => Product::CloudscaleRequests,
        }
    }

    /// Metered quantity over the day.
    ///
    /// Storage is a level and takes the peak; traffic and requests are
    /// flows and are summed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn quantity(self, metrics: &BucketMetrics) -> f64 {
        let value = match self {
            Self::Storage => metrics.usage().map(|u| u.storage_bytes).max().unwrap_or(0),
            Self::TrafficOut => metrics.usage().map(|u| u.sent_bytes).sum(),
            Self::Requests => metrics.usage().map(|u| u.requests).sum(),
        };
        value as f64
    }
}

/// One meter of the bucket metrics as usage.
#[derive(Debug, Clone)]
pub struct CloudscaleUsage {
    metrics: Arc<SharedBucketMetrics>,
    meter: BucketMeter,
}

impl CloudscaleUsage {
    /// Read `meter` from the shared `metrics`.
    #[must_use]
    pub fn new(metrics: Arc<SharedBucketMetrics>, meter: BucketMeter) -> Self {
        Self { metrics, meter }
    }
}

#[async_trait]
impl UsageSource for CloudscaleUsage {
    async fn list_usage(
        &self,
        _zone: Option<&str>,
        window: &TimeRange,
    ) -> Result<Vec<UsageReading>, SourceError> {
        let metrics = self.metrics.for_day(window.start_date()).await?;

        Ok(metrics
            .iter()
            .map(|bucket| UsageReading::new(bucket.name(), self.meter.quantity(bucket)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics() -> BucketMetrics {
        serde_json::from_value(json!({
            "subject": { "name": "bucket-a", "objects_user_id": "abc" },
            "time_series": [
                { "start": "2023-01-10T23:00:00Z", "end": "2023-01-11T11:00:00Z",
                  "usage": { "requests": 10, "storage_bytes": 100, "sent_bytes": 5 } },
                { "start": "2023-01-11T11:00:00Z", "end": "2023-01-11T23:00:00Z",
                  "usage": { "requests": 15, "storage_bytes": 300, "sent_bytes": 7 } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn storage_takes_peak() {
        assert!((BucketMeter::Storage.quantity(&metrics()) - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flows_are_summed() {
        assert!((BucketMeter::TrafficOut.quantity(&metrics()) - 12.0).abs() < f64::EPSILON);
        assert!((BucketMeter::Requests.quantity(&metrics()) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn meters_map_to_products() {
        let products: Vec<_> = BucketMeter::ALL.iter().map(|m| m.product()).collect();
        assert_eq!(
            products,
            vec![
                Product::CloudscaleStorage,
                Product::CloudscaleTrafficOut,
                Product::CloudscaleRequests
            ]
        );
    }
}
