//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `PartidaId` where a `BudgetId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
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

typed_id!(UserId, "Unique identifier for the acting user (audit fields).");
typed_id!(ProjectId, "Unique identifier for a construction project.");
typed_id!(ClientId, "Unique identifier for a client.");
typed_id!(BudgetId, "Unique identifier for a budget.");
typed_id!(PartidaId, "Unique identifier for a partida (cost chapter).");
typed_id!(ConceptoId, "Unique identifier for a concepto (line item).");
typed_id!(SnapshotId, "Unique identifier for a budget snapshot.");
typed_id!(
    PriceObservationId,
    "Unique identifier for a price observation."
);
typed_id!(TemplateId, "Unique identifier for a budget template.");
typed_id!(
    TemplatePartidaId,
    "Unique identifier for a partida inside a template."
);
typed_id!(
    TemplateConceptoId,
    "Unique identifier for a concepto inside a template."
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_typed_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = BudgetId::from_uuid(uuid);
        assert_eq!(id.into_inner(), uuid);
    }

    #[test]
    fn test_typed_ids_are_v7() {
        let id = ConceptoId::new();
        assert_eq!(id.into_inner().get_version_num(), 7);
    }

    #[test]
    fn test_typed_id_display_and_parse() {
        let id = SnapshotId::new();
        let parsed = SnapshotId::from_str(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
        assert!(SnapshotId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_typed_id_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&PartidaId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
