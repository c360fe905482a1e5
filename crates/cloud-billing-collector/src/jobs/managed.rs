//! Jobs billing Crossplane-managed resources.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use cloud_billing_core::{ResourceKind, TimeRange};

use super::{deliver, track, BillingJob};
use crate::aggregate::{Aggregator, RunContext};
use crate::billing_party::{BillingPartyResolver, BillingPartySource};
use crate::error::CollectorError;
use crate::inventory;
use crate::metrics::CollectorMetrics;
use crate::sink::BillingSink;
use crate::sources::{InventorySource, UsageSource};
use crate::usage::fetch_usage;

/// One billed product and where its usage comes from.
#[derive(Clone)]
pub struct ProductLine {
    aggregator: Aggregator,
    usage: Arc<dyn UsageSource>,
    zones: Vec<String>,
}

impl ProductLine {
    /// Product line reading account-wide usage.
    #[must_use]
    pub fn new(aggregator: Aggregator, usage: Arc<dyn UsageSource>) -> Self {
        Self {
            aggregator,
            usage,
            zones: Vec::new(),
        }
    }

    /// Query usage zone by zone.
    #[must_use]
    pub fn with_zones(mut self, zones: Vec<String>) -> Self {
        self.zones = zones;
        self
    }
}

/// Bills managed resources of some kinds against one or more products.
pub struct ManagedResourceJob {
    name: String,
    inventory: Arc<dyn InventorySource>,
    kinds: Vec<ResourceKind>,
    lines: Vec<ProductLine>,
    billing_parties: BillingPartySource,
    sink: Arc<dyn BillingSink>,
    metrics: Arc<CollectorMetrics>,
}

impl ManagedResourceJob {
    /// Create a job.
    ///
    /// # Arguments
    ///
    /// * `name` - Job name used in logs
    /// * `inventory` - Cluster inventory
    /// * `kinds` - Resource kinds the products are billed for
    /// * `billing_parties` - Static override or per-organization lookup
    /// * `sink` - Receives the records
    /// * `metrics` - Provider and sink counters
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        inventory: Arc<dyn InventorySource>,
        kinds: Vec<ResourceKind>,
        billing_parties: BillingPartySource,
        sink: Arc<dyn BillingSink>,
        metrics: Arc<CollectorMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            inventory,
            kinds,
            lines: Vec::new(),
            billing_parties,
            sink,
            metrics,
        }
    }

    /// Add a product line.
    #[must_use]
    pub fn with_line(mut self, line: ProductLine) -> Self {
        self.lines.push(line);
        self
    }
}

#[async_trait]
impl BillingJob for ManagedResourceJob {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(job = %self.name))]
    async fn run_once(&self, reference: DateTime<Utc>) -> Result<usize, CollectorError> {
        let ctx = RunContext::new(reference);
        let details = track(
            &self.metrics,
            inventory::fetch_details(self.inventory.as_ref(), &self.kinds).await,
        )?;

        let mut parties = BillingPartyResolver::new(&self.billing_parties, reference);
        let mut records = Vec::new();

        for line in &self.lines {
            let product = line.aggregator.product();
            let window = TimeRange::for_kind(product.window_kind(), reference)?;
            let usage = track(
                &self.metrics,
                fetch_usage(line.usage.as_ref(), &line.zones, &window).await,
            )?;

            records.extend(
                line.aggregator
                    .aggregate(&usage, &details, &ctx, &mut parties)
                    .await?,
            );
        }

        let sent = deliver(self.sink.as_ref(), &self.metrics, &records).await?;
        info!(records = sent, "Run completed");
        Ok(sent)
    }
}
