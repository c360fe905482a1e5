//! Aggregation of usage and inventory into billing records.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use cloud_billing_core::{
    check_unit, convert, BillingError, BillingRecord, InstanceId, ManagedResourceDetail, Product,
    TimeRange, UnitOfMeasure,
};

use crate::billing_party::BillingPartyResolver;
use crate::usage::UsageMap;

/// Inputs fixed for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    /// Instant the billing window is derived from.
    pub reference: DateTime<Utc>,
}

impl RunContext {
    /// Context for `reference`.
    #[must_use]
    pub fn new(reference: DateTime<Utc>) -> Self {
        Self { reference }
    }
}

/// Turns usage of one product into billing records.
#[derive(Debug, Clone)]
pub struct Aggregator {
    product: Product,
    unit: UnitOfMeasure,
    unit_id: String,
    cluster_id: String,
}

impl Aggregator {
    /// Create an aggregator.
    ///
    /// # Arguments
    ///
    /// * `product` - The product being billed
    /// * `unit` - Contractual unit of the product
    /// * `unit_id` - Id of `unit` in the billing system
    /// * `cluster_id` - Cluster named in the item group description
    #[must_use]
    pub fn new(
        product: Product,
        unit: UnitOfMeasure,
        unit_id: impl Into<String>,
        cluster_id: impl Into<String>,
    ) -> Self {
        Self {
            product,
            unit,
            unit_id: unit_id.into(),
            cluster_id: cluster_id.into(),
        }
    }

    /// The product being billed.
    #[must_use]
    pub fn product(&self) -> Product {
        self.product
    }

    /// Join `details` with `usage` by name and build one record per match.
    ///
    /// Resources without usage, with a provider type that disagrees with
    /// their kind, with incomplete usage metadata, or without a resolvable
    /// billing party are skipped. For a fixed context and inputs the output
    /// is the same on every call.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured unit cannot express the product's
    /// measurement or the window cannot be computed.
    #[instrument(skip_all, fields(product = self.product.slug(), resources = details.len()))]
    pub async fn aggregate(
        &self,
        usage: &UsageMap,
        details: &[ManagedResourceDetail],
        ctx: &RunContext,
        parties: &mut BillingPartyResolver<'_>,
    ) -> Result<Vec<BillingRecord>, BillingError> {
        let slug = self.product.slug();
        check_unit(slug, self.product.measure(), self.unit)?;
        let window = TimeRange::for_kind(self.product.window_kind(), ctx.reference)?;

        let mut records = Vec::new();

        for detail in details {
            let Some(reading) = usage.get(&detail.name) else {
                info!(resource = %detail.name, kind = %detail.kind, "No usage found for resource");
                continue;
            };

            if !reading.matches_kind(detail.kind) {
                warn!(
                    resource = %detail.name,
                    kind = %detail.kind,
                    service_type = ?reading.service_type,
                    "Provider type does not match resource kind, skipping"
                );
                continue;
            }

            let product_id = match self.product.product_id(reading) {
                Ok(id) => id,
                Err(e) if e.is_per_resource() => {
                    warn!(resource = %detail.name, error = %e, "Skipping resource");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let instance_id = match InstanceId::for_resource(&detail.zone, &detail.name) {
                Ok(id) => id,
                Err(e) => {
                    warn!(resource = %detail.name, error = %e, "Skipping resource");
                    continue;
                }
            };

            let consumed_units = convert(slug, reading.quantity, self.product.measure(), self.unit)?;

            let Some(billing_party) = parties.resolve(&detail.organization).await else {
                continue;
            };

            debug!(
                resource = %detail.name,
                product_id = %product_id,
                consumed_units,
                "Built billing record"
            );

            records.push(BillingRecord {
                product_id,
                instance_id,
                item_description: self.product.item_description(reading),
                item_group_description: self.item_group(&detail.namespace, parties.is_static()),
                billing_party,
                unit_id: self.unit_id.clone(),
                consumed_units,
                time_range: window,
            });
        }

        info!(records = records.len(), "Aggregated usage");
        Ok(records)
    }

    fn item_group(&self, namespace: &str, managed: bool) -> String {
        let offering = if managed { "APPUiO Managed" } else { "APPUiO Cloud" };
        format!(
            "{offering} - Zone: {} / Namespace: {namespace}",
            self.cluster_id
        )
    }
}
