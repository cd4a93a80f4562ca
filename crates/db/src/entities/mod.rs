//! `SeaORM` entity definitions.

pub mod budget_snapshots;
pub mod budgets;
pub mod conceptos;
pub mod partidas;
pub mod price_observations;
pub mod template_conceptos;
pub mod template_partidas;
pub mod templates;
