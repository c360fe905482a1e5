//! Units of measure and quantity conversion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

/// Bytes in one (binary) gigabyte.
#[allow(clippy::cast_precision_loss)]
pub const BYTES_PER_GIGABYTE: f64 = (1u64 << 30) as f64;

/// What a provider reports for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// A size or volume in bytes.
    Bytes,
    /// A plain count (instances, requests).
    Count,
}

/// Contractual unit a product is billed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitOfMeasure {
    /// Gigabytes stored for one day.
    #[serde(rename = "GBDay")]
    GigabyteDay,
    /// Gigabytes transferred.
    #[serde(rename = "GB")]
    Gigabyte,
    /// Requests.
    #[serde(rename = "Requests")]
    Requests,
    /// Instances running for one hour.
    #[serde(rename = "InstanceHour")]
    InstanceHour,
    /// Instances.
    #[serde(rename = "Instances")]
    Instances,
}

impl UnitOfMeasure {
    /// Get the unit name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GigabyteDay => "GBDay",
            Self::Gigabyte => "GB",
            Self::Requests => "Requests",
            Self::InstanceHour => "InstanceHour",
            Self::Instances => "Instances",
        }
    }

    /// The measurement this unit is derived from.
    #[must_use]
    pub const fn measure(self) -> Measure {
        match self {
            Self::GigabyteDay | Self::Gigabyte => Measure::Bytes,
            Self::Requests | Self::InstanceHour | Self::Instances => Measure::Count,
        }
    }
}

impl fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitOfMeasure {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GBDay" => Ok(Self::GigabyteDay),
            "GB" => Ok(Self::Gigabyte),
            "Requests" => Ok(Self::Requests),
            "InstanceHour" => Ok(Self::InstanceHour),
            "Instances" => Ok(Self::Instances),
            other => Err(BillingError::UnknownUnit(other.to_string())),
        }
    }
}

/// Check that `unit` can express what the provider measures for `product`.
///
/// # Errors
///
/// Returns `BillingError::UnsupportedUnit` on a mismatch.
pub fn check_unit(product: &str, measure: Measure, unit: UnitOfMeasure) -> Result<()> {
    if unit.measure() == measure {
        Ok(())
    } else {
        Err(BillingError::UnsupportedUnit {
            product: product.to_string(),
            unit,
            measure,
        })
    }
}

/// Convert a raw provider quantity into the contractual unit.
///
/// Byte measurements become gigabytes; counts pass through unchanged.
///
/// # Errors
///
/// Returns `BillingError::UnsupportedUnit` if `unit` cannot express `measure`.
pub fn convert(product: &str, raw: f64, measure: Measure, unit: UnitOfMeasure) -> Result<f64> {
    check_unit(product, measure, unit)?;

    Ok(match measure {
        Measure::Bytes => raw / BYTES_PER_GIGABYTE,
        Measure::Count => raw,
    })
}
