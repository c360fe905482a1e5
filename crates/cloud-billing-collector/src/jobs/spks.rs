//! SPKS instance counts from Prometheus.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use cloud_billing_core::{
    check_unit, convert, BillingRecord, InstanceId, Product, TimeRange, UnitOfMeasure,
    UsageReading,
};

use super::{deliver, track, BillingJob};
use crate::error::CollectorError;
use crate::metrics::CollectorMetrics;
use crate::sink::BillingSink;
use crate::sources::PrometheusClient;

/// Products billed by the SPKS job with the composite kind counted for each.
const SPKS_SERVICES: [(Product, &str, &str); 2] = [
    (Product::SpksMariaDb, "mariadb", "compositemariadbinstances"),
    (Product::SpksRedis, "redis", "compositeredisinstances"),
];

/// SPKS billing settings.
#[derive(Debug, Clone)]
pub struct SpksSettings {
    /// Environment the instances run in, part of the instance id.
    pub environment: String,
    /// Service level counted and billed.
    pub service_sla: String,
    /// Sales order all instances are billed against.
    pub billing_party: String,
    /// Unit of the instance count.
    pub unit: UnitOfMeasure,
    /// Id of `unit` in the billing system.
    pub unit_id: String,
}

/// Counts SPKS MariaDB and Redis instances per day.
pub struct SpksJob {
    prometheus: Arc<PrometheusClient>,
    settings: SpksSettings,
    sink: Arc<dyn BillingSink>,
    metrics: Arc<CollectorMetrics>,
}

impl SpksJob {
    /// Create a job.
    #[must_use]
    pub fn new(
        prometheus: Arc<PrometheusClient>,
        settings: SpksSettings,
        sink: Arc<dyn BillingSink>,
        metrics: Arc<CollectorMetrics>,
    ) -> Self {
        Self {
            prometheus,
            settings,
            sink,
            metrics,
        }
    }
}

#[async_trait]
impl BillingJob for SpksJob {
    fn name(&self) -> &str {
        "spks"
    }

    #[instrument(skip(self), fields(sla = %self.settings.service_sla))]
    async fn run_once(&self, reference: DateTime<Utc>) -> Result<usize, CollectorError> {
        let window = TimeRange::daily(reference)?;
        let settings = &self.settings;
        let mut records = Vec::with_capacity(SPKS_SERVICES.len());

        for (product, service, kind) in SPKS_SERVICES {
            check_unit(product.slug(), product.measure(), settings.unit)?;

            // evaluated at the end of the billing day, looking back one day
            let count = track(
                &self.metrics,
                self.prometheus
                    .count_instances(kind, &settings.service_sla, window.to)
                    .await,
            )?;
            info!(service, count, "Counted instances");

            let reading = UsageReading::new(format!("{service}-{}", settings.environment), count)
                .with_plan(settings.service_sla.clone());

            records.push(BillingRecord {
                product_id: product.product_id(&reading)?,
                instance_id: InstanceId::new(reading.resource_name.clone())
                    .map_err(cloud_billing_core::BillingError::from)?,
                item_description: product.item_description(&reading),
                item_group_description: String::new(),
                billing_party: settings.billing_party.clone(),
                unit_id: settings.unit_id.clone(),
                consumed_units: convert(product.slug(), count, product.measure(), settings.unit)?,
                time_range: window,
            });
        }

        deliver(self.sink.as_ref(), &self.metrics, &records).await
    }
}
