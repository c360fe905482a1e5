//! Billing jobs: one complete collection pass per product family.
//!
//! A job runs strictly sequentially: inventory, usage, aggregation, then a
//! single batch to the sink. The runner invokes [`BillingJob::run_once`] for
//! every tick and catch-up day.

use chrono::{DateTime, Utc};

use async_trait::async_trait;

use cloud_billing_core::BillingRecord;

use crate::error::{CollectorError, SourceError};
use crate::metrics::{CollectorMetrics, Counter};
use crate::sink::BillingSink;

mod managed;
mod spks;

pub use managed::{ManagedResourceJob, ProductLine};
pub use spks::{SpksJob, SpksSettings};

/// A collection pass for one reference instant.
#[async_trait]
pub trait BillingJob: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Collect and send the records for the window derived from `reference`.
    /// Returns the number of records sent.
    async fn run_once(&self, reference: DateTime<Utc>) -> Result<usize, CollectorError>;
}

/// Count a provider call outcome.
fn track<T>(metrics: &CollectorMetrics, result: Result<T, SourceError>) -> Result<T, CollectorError> {
    match result {
        Ok(value) => {
            metrics.inc(Counter::ProviderSucceeded);
            Ok(value)
        }
        Err(e) => {
            metrics.inc(Counter::ProviderFailed);
            Err(e.into())
        }
    }
}

/// Send the batch and count the outcome.
async fn deliver(
    sink: &dyn BillingSink,
    metrics: &CollectorMetrics,
    records: &[BillingRecord],
) -> Result<usize, CollectorError> {
    match sink.send(records).await {
        Ok(()) => {
            metrics.inc(Counter::SinkSucceeded);
            metrics.add(Counter::RecordsSent, records.len() as u64);
            Ok(records.len())
        }
        Err(e) => {
            metrics.inc(Counter::SinkFailed);
            Err(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory collaborators for job tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use cloud_billing_core::{BillingRecord, ClusterObject, ResourceKind, TimeRange, UsageReading};
    use cloud_billing_odoo::OdooError;

    use crate::error::{CollectorError, SourceError};
    use crate::sink::BillingSink;
    use crate::sources::{InventorySource, UsageSource};

    #[derive(Default)]
    pub struct MemoryInventory {
        pub namespaces: HashMap<String, String>,
        pub objects: HashMap<ResourceKind, Vec<ClusterObject>>,
        pub fail: bool,
    }

    #[async_trait]
    impl InventorySource for MemoryInventory {
        async fn namespace_organizations(&self) -> Result<HashMap<String, String>, SourceError> {
            if self.fail {
                return Err(SourceError::NotFound("cluster".into()));
            }
            Ok(self.namespaces.clone())
        }

        async fn list_objects(
            &self,
            kind: ResourceKind,
        ) -> Result<Vec<ClusterObject>, SourceError> {
            if self.fail {
                return Err(SourceError::NotFound("cluster".into()));
            }
            Ok(self.objects.get(&kind).cloned().unwrap_or_default())
        }
    }

    pub struct MemoryUsage(pub Vec<UsageReading>);

    #[async_trait]
    impl UsageSource for MemoryUsage {
        async fn list_usage(
            &self,
            _zone: Option<&str>,
            _window: &TimeRange,
        ) -> Result<Vec<UsageReading>, SourceError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    pub struct MemorySink {
        pub batches: Mutex<Vec<Vec<BillingRecord>>>,
        pub reject: bool,
    }

    #[async_trait]
    impl BillingSink for MemorySink {
        async fn send(&self, records: &[BillingRecord]) -> Result<(), CollectorError> {
            if self.reject {
                return Err(OdooError::Api {
                    status: 500,
                    message: "rejected".into(),
                }
                .into());
            }
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(())
        }
    }
}
