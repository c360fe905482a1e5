//! Odoo metered billing HTTP client implementation.

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use cloud_billing_core::BillingRecord;

use crate::error::OdooError;
use crate::types::{MeteredBillingRecord, SendRecordsRequest, TokenErrorResponse, TokenResponse};

/// Tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(30);

/// Lifetime assumed when the token endpoint does not report one.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// OAuth2 client credentials for the billing API.
#[derive(Clone)]
pub struct OdooCredentials {
    /// Token endpoint.
    pub token_url: String,
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
}

impl std::fmt::Debug for OdooCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdooCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Odoo metered billing API client.
///
/// Posts batches of billing records; the token is shared between calls.
#[derive(Debug)]
pub struct OdooClient {
    client: Client,
    url: String,
    credentials: OdooCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl OdooClient {
    /// Create a new client with default options.
    ///
    /// # Arguments
    ///
    /// * `url` - The metered billing endpoint records are posted to
    /// * `credentials` - OAuth2 client credentials
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is empty or the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, credentials: OdooCredentials) -> Result<Self, OdooError> {
        Self::with_options(url, credentials, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is empty or the HTTP client cannot be built.
    pub fn with_options(
        url: impl Into<String>,
        credentials: OdooCredentials,
        options: ClientOptions,
    ) -> Result<Self, OdooError> {
        let url = url.into();
        if url.is_empty() {
            return Err(OdooError::Configuration("billing API URL is empty".into()));
        }
        if credentials.token_url.is_empty() {
            return Err(OdooError::Configuration("token URL is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Send a batch of billing records.
    ///
    /// Empty batches are not sent. A non-success response fails the whole
    /// batch; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails, the request fails, or the
    /// API answers with a non-success status.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn send_records(&self, records: &[BillingRecord]) -> Result<(), OdooError> {
        if records.is_empty() {
            debug!("No billing records to send");
            return Ok(());
        }

        let request = SendRecordsRequest {
            data: records.iter().map(MeteredBillingRecord::from).collect(),
        };
        let token = self.access_token().await?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(records = records.len(), "Billing records sent");
            return Ok(());
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // force a fresh token on the next run
            self.token.lock().await.take();
        }

        let message = response.text().await.unwrap_or_default();
        Err(OdooError::Api {
            status: status.as_u16(),
            message: if message.is_empty() {
                format!("HTTP {status}")
            } else {
                message
            },
        })
    }

    /// Return a valid access token, fetching a new one if needed.
    async fn access_token(&self) -> Result<String, OdooError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Run the client-credentials grant against the token endpoint.
    async fn fetch_token(&self) -> Result<CachedToken, OdooError> {
        debug!(token_url = %self.credentials.token_url, "Requesting access token");

        let response = self
            .client
            .post(&self.credentials.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<TokenErrorResponse>().await {
                Ok(body) => body.error_description.unwrap_or(body.error),
                Err(_) => format!("HTTP {status}"),
            };
            return Err(OdooError::Auth {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = body
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs)
            .saturating_sub(TOKEN_EXPIRY_SLACK);

        Ok(CachedToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}
