//! Template error types.

use obra_shared::AppError;
use obra_shared::types::{BudgetId, TemplateId};
use thiserror::Error;

use crate::budget::{BudgetError, ValidationError};

/// Template errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template not found.
    #[error("Template not found: {0}")]
    NotFound(TemplateId),

    /// Budget not found.
    #[error("Budget not found: {0}")]
    BudgetNotFound(BudgetId),

    /// Budget is closed and cannot receive a template.
    #[error("Budget {0} is closed and cannot be modified")]
    BudgetClosed(BudgetId),

    /// Input rejected before persistence.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Template merging is switched off.
    #[error("Templates are disabled")]
    Disabled,

    /// Error from the budget layer.
    #[error(transparent)]
    Budget(BudgetError),

    /// Persistence collaborator failure.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<BudgetError> for TemplateError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::NotFound(id) => Self::BudgetNotFound(id),
            BudgetError::BudgetClosed(id) => Self::BudgetClosed(id),
            BudgetError::Validation(e) => Self::Validation(e),
            BudgetError::Repository(msg) => Self::Repository(msg),
            other => Self::Budget(other),
        }
    }
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound(_) | TemplateError::BudgetNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            TemplateError::BudgetClosed(_) => Self::BusinessRule(err.to_string()),
            TemplateError::Validation(e) => Self::Validation(e.to_string()),
            TemplateError::Disabled => Self::FeatureDisabled(err.to_string()),
            TemplateError::Budget(e) => e.into(),
            TemplateError::Repository(msg) => Self::Database(msg),
        }
    }
}
