//! Budget error types.

use obra_shared::AppError;
use obra_shared::types::{BudgetId, ConceptoId, PartidaId};
use thiserror::Error;

use super::validation::ValidationError;

/// Budget-related errors.
#[derive(Debug, Error)]
pub enum BudgetError {
    /// Budget not found.
    #[error("Budget not found: {0}")]
    NotFound(BudgetId),

    /// Partida not found.
    #[error("Partida not found: {0}")]
    PartidaNotFound(PartidaId),

    /// Concepto not found.
    #[error("Concepto not found: {0}")]
    ConceptoNotFound(ConceptoId),

    /// Input rejected before persistence.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Budget is closed and cannot be modified.
    #[error("Budget {0} is closed and cannot be modified")]
    BudgetClosed(BudgetId),

    /// Tax settings are read-only once the budget has been published.
    #[error("Tax settings of budget {0} are read-only once published")]
    TaxSettingsLocked(BudgetId),

    /// Persistence collaborator failure.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<BudgetError> for AppError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::NotFound(_)
            | BudgetError::PartidaNotFound(_)
            | BudgetError::ConceptoNotFound(_) => Self::NotFound(err.to_string()),
            BudgetError::Validation(e) => Self::Validation(e.to_string()),
            BudgetError::BudgetClosed(_) | BudgetError::TaxSettingsLocked(_) => {
                Self::BusinessRule(err.to_string())
            }
            BudgetError::Repository(msg) => Self::Database(msg),
        }
    }
}
