//! Cluster inventory types.
//!
//! Managed resources are Crossplane objects provisioned on behalf of a tenant
//! namespace. Each supported kind knows where it is listed in the Kubernetes
//! API and how its billable name and zone are read from the object.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label carrying the namespace of the claim that owns a managed resource.
pub const NAMESPACE_LABEL: &str = "crossplane.io/claim-namespace";

/// Label carrying the organization that owns a namespace.
pub const ORGANIZATION_LABEL: &str = "appuio.io/organization";

/// Annotation carrying the cloud zone of a DBaaS instance.
pub const CLOUD_ZONE_ANNOTATION: &str = "appcat.vshn.io/cloudzone";

/// A supported kind of cluster-managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Exoscale SOS bucket.
    ExoscaleBucket,
    /// cloudscale object storage bucket.
    CloudscaleBucket,
    /// Exoscale DBaaS `PostgreSQL`.
    PostgreSql,
    /// Exoscale DBaaS `MySQL`.
    MySql,
    /// Exoscale DBaaS `OpenSearch`.
    OpenSearch,
    /// Exoscale DBaaS Redis.
    Redis,
    /// Exoscale DBaaS Kafka.
    Kafka,
}

impl ResourceKind {
    /// All Exoscale DBaaS kinds.
    pub const EXOSCALE_DBAAS: [Self; 5] = [
        Self::PostgreSql,
        Self::MySql,
        Self::OpenSearch,
        Self::Redis,
        Self::Kafka,
    ];

    /// API group the kind is served under.
    #[must_use]
    pub const fn api_group(self) -> &'static str {
        match self {
            Self::CloudscaleBucket => "cloudscale.crossplane.io",
            Self::ExoscaleBucket
            | Self::PostgreSql
            | Self::MySql
            | Self::OpenSearch
            | Self::Redis
            | Self::Kafka => "exoscale.crossplane.io",
        }
    }

    /// API version the kind is served under.
    #[must_use]
    pub const fn api_version(self) -> &'static str {
        "v1"
    }

    /// Plural resource name used in list paths.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::ExoscaleBucket | Self::CloudscaleBucket => "buckets",
            Self::PostgreSql => "postgresqls",
            Self::MySql => "mysqls",
            Self::OpenSearch => "opensearches",
            Self::Redis => "redis",
            Self::Kafka => "kafkas",
        }
    }

    /// Path of the cluster-wide list endpoint for this kind.
    #[must_use]
    pub fn list_path(self) -> String {
        format!(
            "/apis/{}/{}/{}",
            self.api_group(),
            self.api_version(),
            self.plural()
        )
    }

    /// Human readable product name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::ExoscaleBucket => "Exoscale ObjectStorage",
            Self::CloudscaleBucket => "cloudscale ObjectStorage",
            Self::PostgreSql => "PostgreSQL",
            Self::MySql => "MySQL",
            Self::OpenSearch => "OpenSearch",
            Self::Redis => "Redis",
            Self::Kafka => "Kafka",
        }
    }

    /// Billable name of the object.
    ///
    /// Buckets are billed under the provider-side bucket name from the spec;
    /// DBaaS instances under their object name.
    #[must_use]
    pub fn resource_name(self, object: &ClusterObject) -> Option<String> {
        match self {
            Self::ExoscaleBucket | Self::CloudscaleBucket => {
                object.for_provider_str("bucketName").map(str::to_string)
            }
            Self::PostgreSql | Self::MySql | Self::OpenSearch | Self::Redis | Self::Kafka => {
                Some(object.metadata.name.clone()).filter(|name| !name.is_empty())
            }
        }
    }

    /// Zone of the object, empty when not recorded.
    #[must_use]
    pub fn zone(self, object: &ClusterObject) -> String {
        let zone = match self {
            Self::ExoscaleBucket => object.for_provider_str("zone"),
            Self::CloudscaleBucket => object.for_provider_str("region"),
            Self::PostgreSql | Self::MySql | Self::OpenSearch | Self::Redis | Self::Kafka => object
                .metadata
                .annotations
                .get(CLOUD_ZONE_ANNOTATION)
                .map(String::as_str),
        };
        zone.unwrap_or_default().to_string()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Object metadata, reduced to the fields the collector reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Object labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Object annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// A listed cluster object with its metadata and untyped spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterObject {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Object spec.
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl ClusterObject {
    /// Read a string field below `spec.forProvider`.
    #[must_use]
    pub fn for_provider_str(&self, field: &str) -> Option<&str> {
        self.spec
            .get("forProvider")
            .and_then(|p| p.get(field))
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Value of a label, if set.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }
}

/// A managed resource joined with its owning namespace and organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedResourceDetail {
    /// Organization owning the namespace.
    pub organization: String,
    /// Billable resource name.
    pub name: String,
    /// Namespace of the owning claim.
    pub namespace: String,
    /// Cloud zone, empty when not recorded.
    pub zone: String,
    /// Resource kind.
    pub kind: ResourceKind,
}
