//! Cloud services billing collector.
//!
//! Reads usage from cloud provider APIs, joins it with the managed resources
//! found in the cluster, and reports one batch of billing records per run to
//! the metered billing API:
//!
//! - Inventory of Crossplane-managed resources and their organizations
//! - Usage from Exoscale, cloudscale and Prometheus
//! - Aggregation into billing records per product
//! - A scheduled runner with catch-up and cancellation
//! - A `/metrics` endpoint with provider and sink counters
//!
//! # Runs
//!
//! A run is sequential: inventory, usage, aggregation, send. Nothing is
//! kept between runs; the sink deduplicates resent records.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Axum handlers are async by signature
#![allow(clippy::unused_async)]

pub mod aggregate;
pub mod app;
pub mod billing_party;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod inventory;
pub mod jobs;
pub mod metrics;
pub mod routes;
pub mod runner;
pub mod sink;
pub mod sources;
pub mod state;
pub mod usage;

pub use aggregate::{Aggregator, RunContext};
pub use billing_party::{BillingPartyResolver, BillingPartySource};
pub use config::CollectorConfig;
pub use error::{CollectorError, SourceError};
pub use jobs::BillingJob;
pub use metrics::{CollectorMetrics, Counter};
pub use routes::create_router;
pub use runner::{Clock, Runner, Schedule, SystemClock};
pub use state::AppState;
