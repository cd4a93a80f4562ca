//! Price intelligence error types.

use obra_shared::AppError;
use thiserror::Error;

use crate::budget::ValidationError;

/// Price intelligence errors.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Input rejected before persistence.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An observation with the same (budget, cost code, unit, version)
    /// already exists.
    #[error("Duplicate price observation for {cost_code}/{unit}")]
    Duplicate {
        /// Cost code.
        cost_code: String,
        /// Unit.
        unit: String,
    },

    /// Price intelligence is switched off.
    #[error("Price intelligence is disabled")]
    Disabled,

    /// Persistence collaborator failure.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Validation(e) => Self::Validation(e.to_string()),
            PricingError::Duplicate { .. } => Self::Conflict(err.to_string()),
            PricingError::Disabled => Self::FeatureDisabled(err.to_string()),
            PricingError::Repository(msg) => Self::Database(msg),
        }
    }
}
