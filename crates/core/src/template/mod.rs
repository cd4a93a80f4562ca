//! Budget templates and template merging.
//!
//! A merge only ever adds: it creates what the budget lacks and fills empty
//! fields of what it already has. Records are matched by provenance id or
//! by cost code resolved through a [`CostCatalog`].

pub mod catalog;
pub mod delta;
pub mod error;
pub mod service;
pub mod types;

pub use catalog::{CostCatalog, StaticCostCatalog};
pub use delta::calculate_delta;
pub use error::TemplateError;
pub use service::{TemplateRepository, TemplateService};
pub use types::{
    ConceptoFill, ConceptoToAdd, CreateTemplateConceptoInput, CreateTemplateInput,
    CreateTemplatePartidaInput, MergeReport, PartidaTarget, PartidaToAdd, Template,
    TemplateConcepto, TemplateDelta, TemplatePartida, UnmappedItem,
};
