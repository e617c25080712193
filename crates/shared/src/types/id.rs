//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `ClientLedgerId` where a
//! `TrustAccountId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user.");
typed_id!(OrganizationId, "Unique identifier for an organization.");
typed_id!(ClientId, "Unique identifier for a client of the firm.");
typed_id!(MatterId, "Unique identifier for a matter (case).");
typed_id!(TrustAccountId, "Unique identifier for a trust bank account.");
typed_id!(ClientLedgerId, "Unique identifier for a client trust ledger.");
typed_id!(TrustTransactionId, "Unique identifier for a trust transaction.");
typed_id!(
    StatementImportId,
    "Unique identifier for an imported bank statement."
);
typed_id!(StatementLineId, "Unique identifier for a bank statement line.");
typed_id!(ReconciliationId, "Unique identifier for a reconciliation run.");
typed_id!(InvoiceId, "Unique identifier for an invoice.");
typed_id!(LineItemId, "Unique identifier for an invoice line item.");
typed_id!(PaymentId, "Unique identifier for an invoice payment.");

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_new_ids_are_v7() {
        let first = ClientLedgerId::new();
        let second = ClientLedgerId::new();
        assert_ne!(first, second);
        assert_eq!(first.into_inner().get_version_num(), 7);
    }

    #[test]
    fn test_display_and_parse_round_trip() {
        let id = InvoiceId::new();
        let parsed = InvoiceId::from_str(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
        assert!(InvoiceId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let uuid = Uuid::now_v7();
        let id = TrustAccountId::from_uuid(uuid);
        assert_eq!(
            serde_json::to_value(id).unwrap(),
            serde_json::Value::String(uuid.to_string())
        );
    }
}
