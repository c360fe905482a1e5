//! Odoo Metered Billing Client SDK.
//!
//! This crate provides a client for reporting billing records to the Odoo
//! metered billing API. Requests are authenticated with an OAuth2
//! client-credentials token that is fetched lazily and cached until shortly
//! before it expires.
//!
//! # Example
//!
//! ```no_run
//! use cloud_billing_odoo::{OdooClient, OdooCredentials};
//!
//! # async fn example(records: Vec<cloud_billing_core::BillingRecord>) -> Result<(), cloud_billing_odoo::OdooError> {
//! let client = OdooClient::new(
//!     "https://erp.example.com/api/v2/product_usage_report_POST",
//!     OdooCredentials {
//!         token_url: "https://erp.example.com/api/v2/authentication/oauth2/token".into(),
//!         client_id: "collector".into(),
//!         client_secret: "secret".into(),
//!     },
//! )?;
//!
//! client.send_records(&records).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, OdooClient, OdooCredentials};
pub use error::OdooError;
pub use types::*;
