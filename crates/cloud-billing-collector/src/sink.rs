//! Billing sink abstraction.

use async_trait::async_trait;

use cloud_billing_core::BillingRecord;
use cloud_billing_odoo::OdooClient;

use crate::error::CollectorError;

/// Receives one batch of records per run.
#[async_trait]
pub trait BillingSink: Send + Sync {
    /// Deliver a batch. The sink deduplicates on instance, product and
    /// window, so resending a batch is safe.
    async fn send(&self, records: &[BillingRecord]) -> Result<(), CollectorError>;
}

#[async_trait]
impl BillingSink for OdooClient {
    async fn send(&self, records: &[BillingRecord]) -> Result<(), CollectorError> {
        Ok(self.send_records(records).await?)
    }
}
