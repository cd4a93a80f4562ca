//! Snapshot service: publish, close, list and compare.

use std::sync::Arc;

use chrono::Utc;
use obra_shared::EngineConfig;
use obra_shared::types::{BudgetId, SnapshotId};
use tracing::{info, warn};

use super::compare::SnapshotComparer;
use super::error::SnapshotError;
use super::lifecycle::BudgetLifecycle;
use super::types::{BudgetSnapshot, NewSnapshot, PublishInput, PublishResult, SnapshotComparison};
use crate::budget::{
    BudgetAggregator, BudgetRepository, BudgetState, BudgetStatus, TaxSettings, validation,
};
use crate::pricing::{
    NewPriceObservation, ObservationSource, PriceObservationRepository, PriceService,
    RecordOutcome,
};

/// Repository trait for snapshot persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait SnapshotRepository: Send + Sync {
    /// In one transaction: assign `max(version) + 1` (or 1), store the
    /// snapshot, set the budget's status to published and store the tax
    /// settings on the budget.
    ///
    /// Returns `SnapshotError::InvalidTransition` if the budget was closed
    /// concurrently.
    fn commit_publication(
        &self,
        snapshot: NewSnapshot,
    ) -> impl std::future::Future<Output = Result<BudgetSnapshot, SnapshotError>> + Send;

    /// Set a budget's status.
    fn set_budget_status(
        &self,
        budget_id: BudgetId,
        status: BudgetStatus,
    ) -> impl std::future::Future<Output = Result<(), SnapshotError>> + Send;

    /// Find snapshot by ID.
    fn find_snapshot(
        &self,
        id: SnapshotId,
    ) -> impl std::future::Future<Output = Result<Option<BudgetSnapshot>, SnapshotError>> + Send;

    /// List a budget's snapshots by ascending version.
    fn list_snapshots(
        &self,
        budget_id: BudgetId,
    ) -> impl std::future::Future<Output = Result<Vec<BudgetSnapshot>, SnapshotError>> + Send;
}

/// Service for publishing and versioning budgets.
pub struct SnapshotService<B, S, P>
where
    B: BudgetRepository,
    S: SnapshotRepository,
    P: PriceObservationRepository,
{
    budgets: Arc<B>,
    snapshots: Arc<S>,
    prices: Arc<PriceService<P>>,
    config: EngineConfig,
}

impl<B, S, P> SnapshotService<B, S, P>
where
    B: BudgetRepository,
    S: SnapshotRepository,
    P: PriceObservationRepository,
{
    /// Create a new snapshot service.
    #[must_use]
    pub fn new(
        budgets: Arc<B>,
        snapshots: Arc<S>,
        prices: Arc<PriceService<P>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            budgets,
            snapshots,
            prices,
            config,
        }
    }

    /// Publish a budget as a new immutable version.
    ///
    /// Validation and totals happen before any write. The snapshot, the
    /// version number and the status change are committed together; price
    /// observations are recorded afterwards and never fail the publish.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The budget does not exist
    /// - The budget is closed
    /// - Supplied tax settings are invalid, or differ from the frozen ones
    ///   of an already published budget
    /// - The commit fails (nothing is written)
    pub async fn publish(
        &self,
        budget_id: BudgetId,
        input: PublishInput,
    ) -> Result<PublishResult, SnapshotError> {
        let state = self
            .budgets
            .load_state(budget_id)
            .await?
            .ok_or(SnapshotError::BudgetNotFound(budget_id))?;
        let next_status = BudgetLifecycle::publish(state.budget.status)?;

        let tax_settings = self.resolve_tax_settings(&state, input.tax_settings)?;
        let totals = BudgetAggregator::calculate(&state, tax_settings.effective_rates());

        let mut frozen = state;
        frozen.budget.status = next_status;
        frozen.budget.settings.tax = Some(tax_settings);

        let snapshot = self
            .snapshots
            .commit_publication(NewSnapshot {
                id: SnapshotId::new(),
                budget_id,
                state: frozen,
                totals,
                tax_settings,
                notes: input.notes,
                created_by: input.published_by,
                created_at: Utc::now(),
            })
            .await?;

        info!(
            budget_id = %budget_id,
            version = snapshot.version_number,
            grand_total = %snapshot.totals.grand_total,
            "Budget published"
        );

        let mut result = PublishResult {
            snapshot,
            observations_recorded: 0,
            observations_duplicate: 0,
            observations_failed: 0,
        };
        self.record_observations(&mut result).await;
        Ok(result)
    }

    /// Close a published budget. Closed is terminal.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::InvalidTransition` unless the budget is
    /// published, or `SnapshotError::BudgetNotFound`.
    pub async fn close(&self, budget_id: BudgetId) -> Result<(), SnapshotError> {
        let budget = self
            .budgets
            .find_budget(budget_id)
            .await?
            .ok_or(SnapshotError::BudgetNotFound(budget_id))?;
        let status = BudgetLifecycle::close(budget.status)?;
        self.snapshots.set_budget_status(budget_id, status).await?;
        info!(budget_id = %budget_id, "Budget closed");
        Ok(())
    }

    /// List a budget's snapshots by ascending version.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::BudgetNotFound` if the budget does not exist.
    pub async fn get_snapshots(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<BudgetSnapshot>, SnapshotError> {
        if self.budgets.find_budget(budget_id).await?.is_none() {
            return Err(SnapshotError::BudgetNotFound(budget_id));
        }
        let mut snapshots = self.snapshots.list_snapshots(budget_id).await?;
        snapshots.sort_by_key(|s| s.version_number);
        Ok(snapshots)
    }

    /// Get one snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::NotFound` if the snapshot does not exist.
    pub async fn get_snapshot(&self, id: SnapshotId) -> Result<BudgetSnapshot, SnapshotError> {
        self.snapshots
            .find_snapshot(id)
            .await?
            .ok_or(SnapshotError::NotFound(id))
    }

    /// Compare two snapshots, in either argument order.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::NotFound` for a missing snapshot or
    /// `SnapshotError::BudgetMismatch` for snapshots of different budgets.
    pub async fn compare(
        &self,
        a: SnapshotId,
        b: SnapshotId,
    ) -> Result<SnapshotComparison, SnapshotError> {
        let a = self.get_snapshot(a).await?;
        let b = self.get_snapshot(b).await?;
        SnapshotComparer::compare(&a, &b)
    }

    fn resolve_tax_settings(
        &self,
        state: &BudgetState,
        supplied: Option<TaxSettings>,
    ) -> Result<TaxSettings, SnapshotError> {
        let stored = state.budget.settings.tax;
        match (supplied, stored) {
            (Some(supplied), Some(stored))
                if state.budget.status != BudgetStatus::Draft && supplied != stored =>
            {
                Err(SnapshotError::TaxSettingsLocked(state.budget.id))
            }
            (Some(supplied), _) => {
                validation::validate_tax_settings(&supplied)?;
                Ok(supplied)
            }
            (None, Some(stored)) => Ok(stored),
            (None, None) => Ok(TaxSettings::from_policy(&self.config.tax)),
        }
    }

    /// Feeds the published prices into the observation log. Failures are
    /// logged and counted, never returned.
    async fn record_observations(&self, result: &mut PublishResult) {
        if !self.prices.is_enabled() {
            return;
        }

        let snapshot = &result.snapshot;
        let state = &snapshot.state;
        let observed_on = snapshot.created_at.date_naive();
        for partida in state.partidas.iter().filter(|p| p.is_active) {
            for concepto in state
                .conceptos_of(partida.id)
                .into_iter()
                .filter(|c| c.contributes_to_totals())
            {
                let Some(cost_code) = concepto.wbs_code.as_deref().filter(|c| !c.trim().is_empty())
                else {
                    continue;
                };
                let observation = NewPriceObservation {
                    cost_code: cost_code.to_string(),
                    unit: concepto.unit.clone(),
                    unit_price: concepto.pu,
                    currency: state.budget.currency,
                    exchange_rate: None,
                    observed_on,
                    provider: concepto.provider.clone(),
                    project_id: state.budget.project_id,
                    budget_id: Some(snapshot.budget_id),
                    version_number: Some(snapshot.version_number),
                    source: ObservationSource::BudgetPublish,
                };
                match self.prices.record_observation(observation).await {
                    Ok(RecordOutcome::Recorded(_)) => result.observations_recorded += 1,
                    Ok(RecordOutcome::Duplicate) => result.observations_duplicate += 1,
                    Ok(RecordOutcome::Disabled) => {}
                    Err(e) => {
                        result.observations_failed += 1;
                        warn!(
                            budget_id = %snapshot.budget_id,
                            concepto_id = %concepto.id,
                            error = %e,
                            "Failed to record price observation"
                        );
                    }
                }
            }
        }
    }
}
