//! Common types used across the ledger

use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Defines an opaque string identifier.
///
/// New identifiers are random UUIDs, but any string read back from storage is
/// accepted verbatim so that ids written by older snapshots keep resolving.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, unique identifier
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

define_id!(
    /// Identifier of an inventory lot
    LotId
);

define_id!(
    /// Identifier of a sale record
    SaleId
);

/// A derived amount left the representable decimal range
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{field} is out of range")]
pub struct AmountOverflow {
    pub field: &'static str,
}

impl AmountOverflow {
    pub fn new(field: &'static str) -> Self {
        Self { field }
    }
}

/// Deserialize `null` as the type's default.
///
/// Stored snapshots may carry `null` where a browser wrote `NaN`; those fields
/// read back as zero or empty instead of failing the whole record.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
