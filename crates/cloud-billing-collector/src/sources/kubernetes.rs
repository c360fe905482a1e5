//! Kubernetes REST client for namespaces and managed resources.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use cloud_billing_core::{ClusterObject, ObjectMeta, ResourceKind, ORGANIZATION_LABEL};

use super::{api_error, decode, InventorySource};
use crate::error::SourceError;

const SOURCE: &str = "kubernetes";

/// Generic list response; only the items are read.
#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    #[serde(default)]
    metadata: ObjectMeta,
}

/// Client for the Kubernetes API server, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct KubernetesClient {
    client: Client,
    server_url: String,
    token: String,
}

impl KubernetesClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `server_url` - API server base URL
    /// * `token` - Bearer token (service account or user token)
    /// * `ca_pem` - Optional PEM bundle trusted for the API server
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the CA bundle is invalid or the HTTP client
    /// cannot be built.
    pub fn new(
        server_url: impl Into<String>,
        token: impl Into<String>,
        ca_pem: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(pem) = ca_pem {
            builder = builder.add_root_certificate(Certificate::from_pem(pem)?);
        }

        Ok(Self {
            client: builder.build()?,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// GET a list path. `None` means the API server does not serve it.
    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Vec<T>>, SourceError> {
        let response = self
            .client
            .get(format!("{}{path}", self.server_url))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error(SOURCE, response).await);
        }

        let list: ObjectList<T> = decode(SOURCE, response).await?;
        Ok(Some(list.items))
    }
}

#[async_trait]
impl InventorySource for KubernetesClient {
    #[instrument(skip(self))]
    async fn namespace_organizations(&self) -> Result<HashMap<String, String>, SourceError> {
        let namespaces: Vec<Namespace> = self
            .list("/api/v1/namespaces", &[("labelSelector", ORGANIZATION_LABEL)])
            .await?
            .unwrap_or_default();

        let organizations: HashMap<_, _> = namespaces
            .into_iter()
            .filter_map(|ns| {
                let organization = ns.metadata.labels.get(ORGANIZATION_LABEL)?.clone();
                (!organization.is_empty()).then_some((ns.metadata.name, organization))
            })
            .collect();

        debug!(namespaces = organizations.len(), "Listed organization namespaces");
        Ok(organizations)
    }

    #[instrument(skip(self))]
    async fn list_objects(&self, kind: ResourceKind) -> Result<Vec<ClusterObject>, SourceError> {
        match self.list(&kind.list_path(), &[]).await? {
            Some(objects) => {
                debug!(count = objects.len(), "Listed managed resources");
                Ok(objects)
            }
            None => {
                debug!("Resource kind not served by the cluster");
                Ok(Vec::new())
            }
        }
    }
}
