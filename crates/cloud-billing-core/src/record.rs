//! Billing records.

use serde::{Deserialize, Serialize};

use crate::ids::{InstanceId, ProductId};
use crate::window::TimeRange;

/// A normalized, billable line item for one resource and one window.
///
/// Records are derived fresh on every run. The sink deduplicates on
/// `instance_id`, `product_id` and `time_range`, so resending a recomputed
/// batch is idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Product being billed.
    pub product_id: ProductId,

    /// Billed instance, `<zone>/<name>` for managed resources.
    pub instance_id: InstanceId,

    /// Line item description.
    pub item_description: String,

    /// Line item group description.
    pub item_group_description: String,

    /// Sales order or billing account the usage is billed against.
    pub billing_party: String,

    /// Unit of measure id in the billing system.
    pub unit_id: String,

    /// Consumed quantity in the contractual unit.
    pub consumed_units: f64,

    /// Window the consumption is attributed to.
    pub time_range: TimeRange,
}
