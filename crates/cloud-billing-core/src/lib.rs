//! Core types and utilities for the cloud services billing collector.
//!
//! This crate provides the foundational types shared by the collector and the
//! billing sink client:
//!
//! - **Identifiers**: `ProductId`, `InstanceId`
//! - **Inventory**: `ResourceKind`, `ClusterObject`, `ManagedResourceDetail`
//! - **Usage**: `UsageReading`, `DbaasType`
//! - **Records**: `BillingRecord`, `TimeRange`
//! - **Products**: `Product`, `UnitOfMeasure`, `Measure`
//!
//! # Billing calendar
//!
//! Billing days follow the provider's invoicing calendar in `Europe/Zurich`.
//! Daily windows are exactly 24 hours starting at local midnight; hourly
//! windows are exactly one hour. All timestamps are carried in UTC.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod product;
pub mod record;
pub mod resource;
pub mod units;
pub mod usage;
pub mod window;

pub use error::{BillingError, Result};
pub use ids::{IdError, InstanceId, ProductId};
pub use product::Product;
pub use record::BillingRecord;
pub use resource::{
    ClusterObject, ManagedResourceDetail, ObjectMeta, ResourceKind, CLOUD_ZONE_ANNOTATION,
    NAMESPACE_LABEL, ORGANIZATION_LABEL,
};
pub use units::{check_unit, convert, Measure, UnitOfMeasure, BYTES_PER_GIGABYTE};
pub use usage::{DbaasType, UsageReading};
pub use window::{TimeRange, WindowKind, BILLING_TIMEZONE};
