//! Identifier types for billing records.
//!
//! Product and instance identifiers are free-form strings on the wire, but
//! they are the keys the billing sink deduplicates on, so both are wrapped in
//! newtypes that reject empty values.
//!
//! # Macro-based ID Types
//!
//! The `string_id_type!` macro reduces boilerplate for string identifier types,
//! ensuring consistent implementation of serialization, parsing, and display traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Macro to define a string identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `String` with implementations for:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (as string, rejecting empty input)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`, `AsRef<str>`
macro_rules! string_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier, rejecting empty values.
            ///
            /// # Errors
            ///
            /// Returns `IdError::Empty` if the value is empty or only whitespace.
            pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(IdError::Empty(stringify!($name)));
                }
                Ok(Self(value))
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id_type!(ProductId, "A billing product identifier.\n\nProduct ids are deterministic: a fixed prefix plus provider-reported type and plan, or a fixed product slug.");
string_id_type!(InstanceId, "A billed instance identifier.\n\nInstance ids combine zone and resource name (`<zone>/<name>`) so they stay stable and traceable across runs.");

impl InstanceId {
    /// Build the `<zone>/<name>` instance id for a managed resource.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the resource name is empty.
    pub fn for_resource(zone: &str, name: &str) -> Result<Self, IdError> {
        if name.trim().is_empty() {
            return Err(IdError::Empty("InstanceId"));
        }
        Self::new(format!("{zone}/{name}"))
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}
