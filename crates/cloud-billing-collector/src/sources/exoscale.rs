//! Exoscale v2 API client for DBaaS services and SOS bucket usage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use cloud_billing_core::{DbaasType, TimeRange, UsageReading};

use super::{api_error, decode, UsageSource};
use crate::crypto::{exoscale_authorization, SignedRequest};
use crate::error::SourceError;

const SOURCE: &str = "exoscale";

/// Default API endpoint; `{zone}` is replaced per request.
pub const DEFAULT_API_URL: &str = "https://api-{zone}.exoscale.com/v2";

/// Zone used for account-wide calls.
pub const DEFAULT_ZONE: &str = "ch-gva-2";

/// Zones DBaaS services are listed in.
pub const EXOSCALE_ZONES: [&str; 7] = [
    "ch-dk-2", "ch-gva-2", "de-fra-1", "de-muc-1", "at-vie-1", "at-vie-2", "bg-sof-1",
];

/// Signatures are valid this many minutes after signing.
const SIGNATURE_VALIDITY_MINUTES: i64 = 10;

/// API key pair.
#[derive(Clone)]
pub struct ExoscaleCredentials {
    /// API key.
    pub key: String,
    /// API secret.
    pub secret: String,
}

impl std::fmt::Debug for ExoscaleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExoscaleCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A DBaaS service as listed by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseService {
    /// Service name.
    pub name: String,
    /// Service type (`pg`, `mysql`, ...).
    #[serde(rename = "type", default)]
    pub service_type: Option<String>,
    /// Service plan; absent while a service is still being created.
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatabaseServiceList {
    #[serde(rename = "dbaas-services", default)]
    services: Vec<DatabaseService>,
}

/// Storage usage of one SOS bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct SosBucketUsage {
    /// Bucket name.
    pub name: String,
    /// Stored bytes.
    pub size: u64,
    /// Bucket zone.
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SosBucketUsageList {
    #[serde(rename = "sos-buckets-usage", default)]
    buckets: Vec<SosBucketUsage>,
}

/// Exoscale API client.
#[derive(Debug, Clone)]
pub struct ExoscaleClient {
    client: Client,
    api_url: String,
    credentials: ExoscaleCredentials,
    default_zone: String,
}

impl ExoscaleClient {
    /// Create a new client.
    ///
    /// `api_url` may contain a `{zone}` placeholder.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_url: impl Into<String>,
        credentials: ExoscaleCredentials,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            credentials,
            default_zone: DEFAULT_ZONE.to_string(),
        })
    }

    /// Set the zone used for account-wide calls.
    #[must_use]
    pub fn with_default_zone(mut self, zone: impl Into<String>) -> Self {
        self.default_zone = zone.into();
        self
    }

    /// List DBaaS services in a zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with a
    /// non-success status.
    #[instrument(skip(self))]
    pub async fn list_database_services(
        &self,
        zone: &str,
    ) -> Result<Vec<DatabaseService>, SourceError> {
        let list: DatabaseServiceList = self.get(zone, "/dbaas-service").await?;
        debug!(services = list.services.len(), "Listed DBaaS services");
        Ok(list.services)
    }

    /// Storage usage of all SOS buckets in the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with a
    /// non-success status.
    #[instrument(skip(self))]
    pub async fn list_sos_buckets_usage(&self) -> Result<Vec<SosBucketUsage>, SourceError> {
        let list: SosBucketUsageList = self.get(&self.default_zone, "/sos-buckets-usage").await?;
        debug!(buckets = list.buckets.len(), "Listed SOS bucket usage");
        Ok(list.buckets)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        zone: &str,
        path: &str,
    ) -> Result<T, SourceError> {
        let endpoint = format!("{}{path}", self.api_url.replace("{zone}", zone));
        let url = Url::parse(&endpoint)
            .map_err(|e| SourceError::InvalidRequest(format!("{endpoint}: {e}")))?;

        let authorization = exoscale_authorization(
            &self.credentials.key,
            &self.credentials.secret,
            &SignedRequest {
                method: "GET",
                path: url.path(),
                body: "",
                query_values: &[],
                expires: (Utc::now() + chrono::Duration::minutes(SIGNATURE_VALIDITY_MINUTES)).timestamp(),
            },
        );

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(SOURCE, response).await);
        }
        decode(SOURCE, response).await
    }
}

/// DBaaS services as usage: one instance per service.
#[derive(Debug, Clone)]
pub struct ExoscaleDbaasUsage {
    client: Arc<ExoscaleClient>,
}

impl ExoscaleDbaasUsage {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: Arc<ExoscaleClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UsageSource for ExoscaleDbaasUsage {
    async fn list_usage(
        &self,
        zone: Option<&str>,
        _window: &TimeRange,
    ) -> Result<Vec<UsageReading>, SourceError> {
        let zone = zone.unwrap_or(&self.client.default_zone);
        let services = self.client.list_database_services(zone).await?;

        Ok(services
            .into_iter()
            .map(|service| {
                let mut reading = UsageReading::new(service.name, 1.0);
                if let Some(service_type) = service.service_type {
                    reading = reading.with_service_type(DbaasType::from(service_type));
                }
                if let Some(plan) = service.plan {
                    reading = reading.with_plan(plan);
                }
                reading
            })
            .collect())
    }
}

/// SOS bucket sizes as usage.
#[derive(Debug, Clone)]
pub struct ExoscaleSosUsage {
    client: Arc<ExoscaleClient>,
}

impl ExoscaleSosUsage {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: Arc<ExoscaleClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UsageSource for ExoscaleSosUsage {
    #[allow(clippy::cast_precision_loss)]
    async fn list_usage(
        &self,
        _zone: Option<&str>,
        _window: &TimeRange,
    ) -> Result<Vec<UsageReading>, SourceError> {
        let buckets = self.client.list_sos_buckets_usage().await?;

        Ok(buckets
            .into_iter()
            .map(|bucket| UsageReading::new(bucket.name, bucket.size as f64))
            .collect())
    }
}
