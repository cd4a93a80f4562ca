//! Repository implementations for data access.
//!
//! Each repository implements the matching trait from `obra-core`, hiding
//! the `SeaORM` details from the services.

pub mod budget;
pub mod price_observation;
pub mod snapshot;
pub mod template;

pub use budget::BudgetRepository;
pub use price_observation::PriceObservationRepository;
pub use snapshot::SnapshotRepository;
pub use template::TemplateRepository;
