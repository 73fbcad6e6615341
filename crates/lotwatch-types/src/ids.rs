//! Strongly-typed identifiers for lots, spots, plates and users.
//!
//! Lots and plates are free-form strings assigned outside this system
//! (`"dlf-mall"`, `"DL01AB1234"`), sensors are small integers unique within
//! a lot, and users are UUID v7 values minted by the session layer.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Errors raised when constructing an identifier from raw input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier was empty after trimming whitespace.
    #[error("{kind} must not be empty")]
    Empty {
        /// Which identifier was being built.
        kind: &'static str,
    },
}

/// Generates a trimmed, non-empty string identifier.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(try_from = "String")]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(String);

        impl $name {
            /// Build the identifier, trimming surrounding whitespace.
            ///
            /// # Errors
            ///
            /// Returns [`IdError::Empty`] if nothing is left after trimming.
            pub fn new(raw: impl AsRef<str>) -> Result<Self, IdError> {
                let trimmed = raw.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty { kind: $kind });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier, returning the owned string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id! {
    /// Identifier of a parking facility (e.g. `"dlf-mall"`).
    LotId, "lot id"
}

define_string_id! {
    /// A vehicle registration plate as reported by the sensors.
    ///
    /// Comparison is exact: the store filters plates by equality, so no
    /// case folding happens here either.
    PlateNumber, "plate number"
}

/// Identifier of a physical spot sensor, unique within a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SensorId(pub u32);

impl SensorId {
    /// Return the raw sensor number.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SensorId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Identifier of a dashboard user whose session tracks a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_are_trimmed() {
        let lot = LotId::new("  dlf-mall ").unwrap();
        assert_eq!(lot.as_str(), "dlf-mall");
        assert_eq!(lot.to_string(), "dlf-mall");
    }

    #[test]
    fn empty_ids_are_rejected() {
        assert_eq!(
            PlateNumber::new("   "),
            Err(IdError::Empty {
                kind: "plate number"
            })
        );
        assert!("".parse::<LotId>().is_err());
    }

    #[test]
    fn plates_compare_exactly() {
        let upper = PlateNumber::new("DL01AB1234").unwrap();
        let lower = PlateNumber::new("dl01ab1234").unwrap();
        assert_ne!(upper, lower);
    }

    #[test]
    fn string_ids_serialize_as_plain_strings() {
        let lot = LotId::new("igi-airport").unwrap();
        let json = serde_json::to_string(&lot).unwrap();
        assert_eq!(json, "\"igi-airport\"");
    }

    #[test]
    fn deserialized_ids_are_trimmed() {
        let plate: PlateNumber = serde_json::from_str("\" DL01AB1234 \"").unwrap();
        assert_eq!(plate.as_str(), "DL01AB1234");
        assert_eq!(plate, PlateNumber::new("DL01AB1234").unwrap());
    }

    #[test]
    fn blank_ids_fail_to_deserialize() {
        assert!(serde_json::from_str::<PlateNumber>("\"   \"").is_err());
        assert!(serde_json::from_str::<LotId>("\"\"").is_err());
    }

    #[test]
    fn user_ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
    }
}
