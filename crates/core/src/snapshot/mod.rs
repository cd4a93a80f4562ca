//! Budget publishing, versioning and snapshot comparison.

pub mod compare;
pub mod error;
pub mod lifecycle;
pub mod service;
pub mod types;

pub use compare::SnapshotComparer;
pub use error::SnapshotError;
pub use lifecycle::BudgetLifecycle;
pub use service::{SnapshotRepository, SnapshotService};
pub use types::{
    BudgetSnapshot, ChangeCounts, ChangeKind, ConceptoChange, NewSnapshot, PartidaChange,
    PublishInput, PublishResult, SnapshotComparison,
};
