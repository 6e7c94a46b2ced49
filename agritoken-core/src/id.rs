use serde::{Deserialize, Serialize};
use std::fmt;

// Identifiers are opaque strings. Records produced by earlier deployments
// carry ids in several shapes (numeric counters, `farm-<millis>` slugs), so
// none of these types impose a format beyond non-emptiness at validation.

/// Uniquely identifies a registered farm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FarmId(String);

/// Uniquely identifies one investor's holding in one farm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldingId(String);

/// Opaque handle to the on-chain asset backing a farm's tokens, as returned
/// by the asset ledger. The platform never inspects its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

/// Opaque handle to a submitted on-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

/// Build a unique suffix from the current wall clock. Collisions within one
/// nanosecond are not a concern at platform request rates.
fn unique_suffix() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .to_le_bytes();
    hex::encode(&nanos[0..8])
}

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Generate a fresh identifier for a newly created record.
            pub fn generate() -> Self {
                $name(format!("{}-{}", $prefix, unique_suffix()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                $name(id)
            }
        }
    };
}

string_id!(FarmId, "farm");
string_id!(HoldingId, "holding");
string_id!(AssetRef, "asset");
string_id!(TxRef, "tx");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let a = FarmId::generate();
        let b = FarmId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("farm-"));
    }

    #[test]
    fn test_display_round_trip() {
        let id = HoldingId::new("holding-42");
        assert_eq!(id.to_string(), "holding-42");
        assert_eq!(HoldingId::from("holding-42"), id);
    }

    #[test]
    fn test_serde_transparent() {
        let id = FarmId::new("farm-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"farm-1\"");
        let back: FarmId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
