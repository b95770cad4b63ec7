//! Strongly-typed identifiers for Remit entities.
//!
//! All identifiers are:
//! - **Strongly typed**: an `OrderId` cannot be passed where a `PaymentId` is expected
//! - **Lexicographically sortable**: ULIDs encode creation time and sort naturally
//! - **Globally unique**: no coordination required for generation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a new unique identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// Creates an identifier from a raw ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the creation timestamp encoded in the ID.
            #[must_use]
            pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                let ms = self.0.timestamp_ms();
                chrono::DateTime::from_timestamp_millis(ms as i64)
                    .unwrap_or_else(chrono::Utc::now)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Ulid::from_string(s)
                    .map(Self)
                    .map_err(|e| Error::InvalidId {
                        message: format!(concat!("invalid ", $label, " ID '{}': {}"), s, e),
                    })
            }
        }
    };
}

entity_id!(
    /// A unique identifier for an order (an intent to pay).
    OrderId,
    "order"
);

entity_id!(
    /// A unique identifier for a captured payment.
    PaymentId,
    "payment"
);

entity_id!(
    /// A unique identifier for a provisioned project workspace.
    ProjectId,
    "project"
);

entity_id!(
    /// A unique identifier for an internal fulfillment task record.
    TaskRecordId,
    "task"
);

entity_id!(
    /// A unique identifier for one execution of a workflow trigger.
    WorkflowRunId,
    "workflow run"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_roundtrip() {
        let id = OrderId::generate();
        let s = id.to_string();
        let parsed: OrderId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn payment_id_roundtrip() {
        let id = PaymentId::generate();
        let s = id.to_string();
        let parsed: PaymentId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_are_unique() {
        let id1 = WorkflowRunId::generate();
        let id2 = WorkflowRunId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn invalid_id_returns_error() {
        let result: Result<OrderId> = "not-a-valid-ulid".parse();
        assert!(result.is_err());
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = ProjectId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
