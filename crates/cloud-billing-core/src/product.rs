//! Billable products.
//!
//! Each product fixes how its id is built, what the provider measures, the
//! default contractual unit and the window granularity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::ids::ProductId;
use crate::units::{Measure, UnitOfMeasure};
use crate::usage::UsageReading;
use crate::window::WindowKind;

/// Product id prefix for Exoscale DBaaS, followed by `-<type>-<plan>`.
pub const EXOSCALE_DBAAS_PREFIX: &str = "appcat-exoscale-dbaas";

/// A billable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    /// Exoscale SOS storage, billed per GB and day.
    ExoscaleObjectStorage,
    /// Exoscale DBaaS instances, billed per instance hour.
    ExoscaleDbaas,
    /// cloudscale object storage, billed per GB and day.
    CloudscaleStorage,
    /// cloudscale outgoing traffic, billed per GB.
    CloudscaleTrafficOut,
    /// cloudscale object storage requests.
    CloudscaleRequests,
    /// SPKS `MariaDB` instances for a service level.
    SpksMariaDb,
    /// SPKS Redis instances for a service level.
    SpksRedis,
}

impl Product {
    /// Short name used in logs and metrics.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::ExoscaleObjectStorage => "appcat-exoscale-object-storage",
            Self::ExoscaleDbaas => EXOSCALE_DBAAS_PREFIX,
            Self::CloudscaleStorage => "appcat-cloudscale-objectstorage-storage",
            Self::CloudscaleTrafficOut => "appcat-cloudscale-objectstorage-trafficout",
            Self::CloudscaleRequests => "appcat-cloudscale-objectstorage-requests",
            Self::SpksMariaDb => "appcat-spks-mariadb",
            Self::SpksRedis => "appcat-spks-redis",
        }
    }

    /// What the provider reports for this product.
    #[must_use]
    pub const fn measure(self) -> Measure {
        match self {
            Self::ExoscaleObjectStorage | Self::CloudscaleStorage | Self::CloudscaleTrafficOut => {
                Measure::Bytes
            }
            Self::ExoscaleDbaas
            | Self::CloudscaleRequests
            | Self::SpksMariaDb
            | Self::SpksRedis => Measure::Count,
        }
    }

    /// Contractual unit unless configured otherwise.
    #[must_use]
    pub const fn default_unit(self) -> UnitOfMeasure {
        match self {
            Self::ExoscaleObjectStorage | Self::CloudscaleStorage => UnitOfMeasure::GigabyteDay,
            Self::CloudscaleTrafficOut => UnitOfMeasure::Gigabyte,
            Self::CloudscaleRequests => UnitOfMeasure::Requests,
            Self::ExoscaleDbaas => UnitOfMeasure::InstanceHour,
            Self::SpksMariaDb | Self::SpksRedis => UnitOfMeasure::Instances,
        }
    }

    /// Window granularity.
    #[must_use]
    pub const fn window_kind(self) -> WindowKind {
        match self {
            Self::ExoscaleDbaas => WindowKind::Hourly,
            _ => WindowKind::Daily,
        }
    }

    /// Deterministic product id for a reading.
    ///
    /// DBaaS and SPKS ids embed the provider-reported type or plan; the
    /// object storage products use their fixed slug.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::IncompleteUsage` if the reading lacks the type
    /// or plan the id needs.
    pub fn product_id(self, reading: &UsageReading) -> Result<ProductId> {
        let id = match self {
            Self::ExoscaleDbaas => {
                let service_type = reading.service_type.as_ref().ok_or_else(|| {
                    BillingError::IncompleteUsage {
                        resource: reading.resource_name.clone(),
                        field: "service type",
                    }
                })?;
                let plan = required_plan(reading)?;
                format!("{EXOSCALE_DBAAS_PREFIX}-{service_type}-{plan}")
            }
            Self::SpksMariaDb | Self::SpksRedis => {
                format!("{}-{}", self.slug(), required_plan(reading)?)
            }
            Self::ExoscaleObjectStorage
            | Self::CloudscaleStorage
            | Self::CloudscaleTrafficOut
            | Self::CloudscaleRequests => self.slug().to_string(),
        };

        Ok(ProductId::new(id)?)
    }

    /// Line item description for a reading.
    #[must_use]
    pub fn item_description(self, reading: &UsageReading) -> String {
        match self {
            Self::ExoscaleObjectStorage => "AppCat Exoscale ObjectStorage".to_string(),
            Self::ExoscaleDbaas => {
                let name = match &reading.service_type {
                    Some(service_type) => service_type.resource_kind().map_or_else(
                        || service_type.to_string(),
                        |kind| kind.display_name().to_string(),
                    ),
                    None => String::new(),
                };
                format!("Exoscale DBaaS {name}")
            }
            Self::CloudscaleStorage => "AppCat cloudscale ObjectStorage".to_string(),
            Self::CloudscaleTrafficOut => "AppCat cloudscale ObjectStorage traffic out".to_string(),
            Self::CloudscaleRequests => "AppCat cloudscale ObjectStorage requests".to_string(),
            Self::SpksMariaDb => "SPKS MariaDB".to_string(),
            Self::SpksRedis => "SPKS Redis".to_string(),
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

fn required_plan(reading: &UsageReading) -> Result<&str> {
    reading
        .service_plan
        .as_deref()
        .filter(|plan| !plan.is_empty())
        .ok_or_else(|| BillingError::IncompleteUsage {
            resource: reading.resource_name.clone(),
            field: "service plan",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbaasType;

    #[test]
    fn dbaas_product_id_embeds_type_and_plan() {
        let reading = UsageReading::new("postgres-abc", 1.0)
            .with_service_type(DbaasType::Pg)
            .with_plan("hobbyist-2");

        let id = Product::ExoscaleDbaas.product_id(&reading).unwrap();
        assert_eq!(id.as_str(), "appcat-exoscale-dbaas-pg-hobbyist-2");
        assert_eq!(
            Product::ExoscaleDbaas.item_description(&reading),
            "Exoscale DBaaS PostgreSQL"
        );
    }

    #[test]
    fn dbaas_without_plan_is_incomplete() {
        let reading = UsageReading::new("postgres-abc", 1.0).with_service_type(DbaasType::Pg);

        let err = Product::ExoscaleDbaas.product_id(&reading).unwrap_err();
        assert!(err.is_per_resource());
    }

    #[test]
    fn storage_products_use_fixed_slug() {
        let reading = UsageReading::new("bucket", 0.0);
        assert_eq!(
            Product::ExoscaleObjectStorage.product_id(&reading).unwrap().as_str(),
            "appcat-exoscale-object-storage"
        );
        assert_eq!(
            Product::CloudscaleRequests.product_id(&reading).unwrap().as_str(),
            "appcat-cloudscale-objectstorage-requests"
        );
    }

    #[test]
    fn spks_product_id_embeds_service_level() {
        let reading = UsageReading::new("mariadb", 3.0).with_plan("premium");
        assert_eq!(
            Product::SpksMariaDb.product_id(&reading).unwrap().as_str(),
            "appcat-spks-mariadb-premium"
        );
    }

    #[test]
    fn default_units_match_measurements() {
        for product in [
            Product::ExoscaleObjectStorage,
            Product::ExoscaleDbaas,
            Product::CloudscaleStorage,
            Product::CloudscaleTrafficOut,
            Product::CloudscaleRequests,
            Product::SpksMariaDb,
            Product::SpksRedis,
        ] {
            assert_eq!(product.default_unit().measure(), product.measure(), "{product}");
        }
    }
}
