//! Usage readings reported by providers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;

/// A provider-reported consumption metric for one resource.
///
/// Readings are keyed by resource name. Names are unique across resource
/// kinds within a provider account, which the join in the aggregation relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReading {
    /// Provider-side resource name.
    pub resource_name: String,

    /// Raw quantity in the provider's measurement (bytes, count).
    pub quantity: f64,

    /// Service type, for APIs that serve several resource kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<DbaasType>,

    /// Service plan, if the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_plan: Option<String>,
}

impl UsageReading {
    /// Create a reading without type or plan metadata.
    #[must_use]
    pub fn new(resource_name: impl Into<String>, quantity: f64) -> Self {
        Self {
            resource_name: resource_name.into(),
            quantity,
            service_type: None,
            service_plan: None,
        }
    }

    /// Set the service type.
    #[must_use]
    pub fn with_service_type(mut self, service_type: DbaasType) -> Self {
        self.service_type = Some(service_type);
        self
    }

    /// Set the service plan.
    #[must_use]
    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.service_plan = Some(plan.into());
        self
    }

    /// Whether the provider-reported type agrees with a resource kind.
    ///
    /// Readings without a service type match any kind.
    #[must_use]
    pub fn matches_kind(&self, kind: ResourceKind) -> bool {
        match &self.service_type {
            None => true,
            Some(service_type) => service_type.resource_kind() == Some(kind),
        }
    }
}

/// Exoscale DBaaS service type, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DbaasType {
    /// `PostgreSQL` (`pg`).
    Pg,
    /// `MySQL` (`mysql`).
    Mysql,
    /// `OpenSearch` (`opensearch`).
    Opensearch,
    /// Redis (`redis`).
    Redis,
    /// Kafka (`kafka`).
    Kafka,
    /// A type the collector does not manage.
    Other(String),
}

impl DbaasType {
    /// Get the provider type name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pg => "pg",
            Self::Mysql => "mysql",
            Self::Opensearch => "opensearch",
            Self::Redis => "redis",
            Self::Kafka => "kafka",
            Self::Other(name) => name,
        }
    }

    /// The managed resource kind for this service type.
    #[must_use]
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Pg => Some(ResourceKind::PostgreSql),
            Self::Mysql => Some(ResourceKind::MySql),
            Self::Opensearch => Some(ResourceKind::OpenSearch),
            Self::Redis => Some(ResourceKind::Redis),
            Self::Kafka => Some(ResourceKind::Kafka),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for DbaasType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pg" => Self::Pg,
            "mysql" => Self::Mysql,
            "opensearch" => Self::Opensearch,
            "redis" => Self::Redis,
            "kafka" => Self::Kafka,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for DbaasType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<DbaasType> for String {
    fn from(value: DbaasType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DbaasType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
