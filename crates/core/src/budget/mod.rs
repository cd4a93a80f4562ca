//! Budget structure, defaults resolution, line-item computation and totals.
//!
//! This module implements:
//! - Budget, partida and concepto records with their edit inputs
//! - Effective percentage resolution (partida → budget → system)
//! - Derived quantity, price and total of each line item
//! - Totals with IVA and retenciones, and cost-mayor grouping
//! - Input validation
//! - Budget service over a repository trait

pub mod aggregation;
pub mod defaults;
pub mod error;
pub mod line_item;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod aggregation_props;
#[cfg(test)]
mod line_item_props;

pub use aggregation::{BudgetAggregator, BudgetTotals, CostMayorGroup, CostMayorTotals, PartidaTotal};
pub use defaults::{DefaultsResolver, EffectiveRates, PartidaOverrides};
pub use error::BudgetError;
pub use line_item::{DerivedAmounts, LineItemCalculator};
pub use service::{BudgetRepository, BudgetService, apply_budget_edit};
pub use types::{
    Budget, BudgetBatch, BudgetSettings, BudgetState, BudgetStatus, Concepto, CreateBudgetInput,
    CreateConceptoInput, CreatePartidaInput, Partida, TaxRates, TaxSettings, UpdateBudgetInput,
    UpdateConceptoInput, UpdatePartidaInput,
};
pub use validation::ValidationError;
