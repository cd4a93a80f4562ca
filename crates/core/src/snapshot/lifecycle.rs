//! Budget status state machine.
//!
//! ```text
//! draft ──publish──▶ published ──close──▶ closed
//!                     │    ▲
//!                     └────┘ publish (next version)
//! ```

use crate::budget::BudgetStatus;

use super::error::SnapshotError;

/// Stateless validation of budget status transitions.
pub struct BudgetLifecycle;

impl BudgetLifecycle {
    /// Validates a publish and returns the new status.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::InvalidTransition` from `Closed`.
    pub fn publish(current: BudgetStatus) -> Result<BudgetStatus, SnapshotError> {
        match current {
            BudgetStatus::Draft | BudgetStatus::Published => Ok(BudgetStatus::Published),
            BudgetStatus::Closed => Err(SnapshotError::InvalidTransition {
                from: current,
                to: BudgetStatus::Published,
            }),
        }
    }

    /// Validates a close and returns the new status.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::InvalidTransition` unless the budget is published.
    pub fn close(current: BudgetStatus) -> Result<BudgetStatus, SnapshotError> {
        match current {
            BudgetStatus::Published => Ok(BudgetStatus::Closed),
            _ => Err(SnapshotError::InvalidTransition {
                from: current,
                to: BudgetStatus::Closed,
            }),
        }
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub fn is_valid_transition(from: BudgetStatus, to: BudgetStatus) -> bool {
        matches!(
            (from, to),
            (
                BudgetStatus::Draft | BudgetStatus::Published,
                BudgetStatus::Published
            ) | (BudgetStatus::Published, BudgetStatus::Closed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_publish_from_draft_and_published() {
        assert_eq!(
            BudgetLifecycle::publish(BudgetStatus::Draft).unwrap(),
            BudgetStatus::Published
        );
        assert_eq!(
            BudgetLifecycle::publish(BudgetStatus::Published).unwrap(),
            BudgetStatus::Published
        );
    }

    #[test]
    fn test_publish_from_closed_fails() {
        let err = BudgetLifecycle::publish(BudgetStatus::Closed).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::InvalidTransition {
                from: BudgetStatus::Closed,
                to: BudgetStatus::Published
            }
        ));
    }

    #[rstest]
    #[case(BudgetStatus::Draft, false)]
    #[case(BudgetStatus::Published, true)]
    #[case(BudgetStatus::Closed, false)]
    fn test_close(#[case] from: BudgetStatus, #[case] ok: bool) {
        assert_eq!(BudgetLifecycle::close(from).is_ok(), ok);
    }

    #[test]
    fn test_no_transition_back_to_draft() {
        for from in [
            BudgetStatus::Draft,
            BudgetStatus::Published,
            BudgetStatus::Closed,
        ] {
            assert!(!BudgetLifecycle::is_valid_transition(from, BudgetStatus::Draft));
        }
        assert!(!BudgetLifecycle::is_valid_transition(
            BudgetStatus::Draft,
            BudgetStatus::Closed
        ));
        assert!(!BudgetLifecycle::is_valid_transition(
            BudgetStatus::Closed,
            BudgetStatus::Published
        ));
    }
}
