//! Snapshot error types.

use obra_shared::AppError;
use obra_shared::types::{BudgetId, SnapshotId};
use thiserror::Error;

use crate::budget::{BudgetError, BudgetStatus, ValidationError};

/// Snapshot and lifecycle errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot not found.
    #[error("Snapshot not found: {0}")]
    NotFound(SnapshotId),

    /// Budget not found.
    #[error("Budget not found: {0}")]
    BudgetNotFound(BudgetId),

    /// Invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: BudgetStatus,
        /// Target status.
        to: BudgetStatus,
    },

    /// Supplied tax settings differ from the frozen ones.
    #[error("Tax settings of budget {0} are read-only once published")]
    TaxSettingsLocked(BudgetId),

    /// The two snapshots belong to different budgets.
    #[error("Snapshots belong to different budgets: {0} and {1}")]
    BudgetMismatch(BudgetId, BudgetId),

    /// Input rejected before persistence.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Error from the budget layer.
    #[error(transparent)]
    Budget(BudgetError),

    /// Persistence collaborator failure.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<BudgetError> for SnapshotError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::NotFound(id) => Self::BudgetNotFound(id),
            BudgetError::Validation(e) => Self::Validation(e),
            BudgetError::Repository(msg) => Self::Repository(msg),
            other => Self::Budget(other),
        }
    }
}

impl From<SnapshotError> for AppError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::NotFound(_) | SnapshotError::BudgetNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            SnapshotError::InvalidTransition { .. } | SnapshotError::TaxSettingsLocked(_) => {
                Self::BusinessRule(err.to_string())
            }
            SnapshotError::BudgetMismatch(..) | SnapshotError::Validation(_) => {
                Self::Validation(err.to_string())
            }
            SnapshotError::Budget(e) => e.into(),
            SnapshotError::Repository(msg) => Self::Database(msg),
        }
    }
}
