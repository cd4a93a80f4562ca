//! Snapshot repository: versioned, immutable budget snapshots.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use super::budget::budget_to_domain;
use crate::entities::{budget_snapshots, budgets};
use obra_core::budget::BudgetStatus;
use obra_core::snapshot::{
    BudgetSnapshot, NewSnapshot, SnapshotError, SnapshotRepository as SnapshotRepoTrait,
};
use obra_shared::types::{BudgetId, SnapshotId, UserId};

/// Snapshot repository implementation.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    db: DatabaseConnection,
}

impl SnapshotRepository {
    /// Create a new snapshot repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl SnapshotRepoTrait for SnapshotRepository {
    async fn commit_publication(
        &self,
        snapshot: NewSnapshot,
    ) -> Result<BudgetSnapshot, SnapshotError> {
        let txn = self.db.begin().await.map_err(repo_err)?;

        // Row lock serialises concurrent publishes of the same budget.
        let Some(budget_model) = budgets::Entity::find_by_id(snapshot.budget_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(repo_err)?
        else {
            return Err(SnapshotError::BudgetNotFound(snapshot.budget_id));
        };
        let mut budget = budget_to_domain(budget_model.clone())?;
        if budget.status == BudgetStatus::Closed {
            return Err(SnapshotError::InvalidTransition {
                from: BudgetStatus::Closed,
                to: BudgetStatus::Published,
            });
        }

        let latest: Option<i32> = budget_snapshots::Entity::find()
            .select_only()
            .column_as(budget_snapshots::Column::VersionNumber.max(), "max_version")
            .filter(budget_snapshots::Column::BudgetId.eq(snapshot.budget_id.into_inner()))
            .into_tuple::<Option<i32>>()
            .one(&txn)
            .await
            .map_err(repo_err)?
            .flatten();
        let version_number = latest.unwrap_or(0) + 1;

        let stored = snapshot.into_snapshot(version_number);
        snapshot_active_model(&stored)?
            .insert(&txn)
            .await
            .map_err(repo_err)?;

        budget.settings.tax = Some(stored.tax_settings);
        let settings = serde_json::to_value(&budget.settings).map_err(repo_err)?;
        let mut active = budget_model.into_active_model();
        active.status = Set(BudgetStatus::Published.as_str().to_string());
        active.settings = Set(settings);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await.map_err(repo_err)?;

        txn.commit().await.map_err(repo_err)?;
        debug!(
            budget_id = %stored.budget_id,
            version = version_number,
            "Publication committed"
        );
        Ok(stored)
    }

    async fn set_budget_status(
        &self,
        budget_id: BudgetId,
        status: BudgetStatus,
    ) -> Result<(), SnapshotError> {
        let model = budgets::Entity::find_by_id(budget_id.into_inner())
            .one(&self.db)
            .await
            .map_err(repo_err)?
            .ok_or(SnapshotError::BudgetNotFound(budget_id))?;

        let mut active = model.into_active_model();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await.map_err(repo_err)?;
        Ok(())
    }

    async fn find_snapshot(&self, id: SnapshotId) -> Result<Option<BudgetSnapshot>, SnapshotError> {
        budget_snapshots::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(repo_err)?
            .map(snapshot_to_domain)
            .transpose()
    }

    async fn list_snapshots(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<BudgetSnapshot>, SnapshotError> {
        budget_snapshots::Entity::find()
            .filter(budget_snapshots::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_asc(budget_snapshots::Column::VersionNumber)
            .all(&self.db)
            .await
            .map_err(repo_err)?
            .into_iter()
            .map(snapshot_to_domain)
            .collect()
    }
}

fn repo_err(e: impl std::fmt::Display) -> SnapshotError {
    SnapshotError::Repository(e.to_string())
}

fn snapshot_active_model(
    snapshot: &BudgetSnapshot,
) -> Result<budget_snapshots::ActiveModel, SnapshotError> {
    Ok(budget_snapshots::ActiveModel {
        id: Set(snapshot.id.into_inner()),
        budget_id: Set(snapshot.budget_id.into_inner()),
        version_number: Set(snapshot.version_number),
        snapshot_data: Set(serde_json::to_value(&snapshot.state).map_err(repo_err)?),
        totals: Set(serde_json::to_value(&snapshot.totals).map_err(repo_err)?),
        tax_settings: Set(serde_json::to_value(snapshot.tax_settings).map_err(repo_err)?),
        grand_total: Set(snapshot.totals.grand_total),
        notes: Set(snapshot.notes.clone()),
        created_by: Set(snapshot.created_by.into_inner()),
        created_at: Set(snapshot.created_at.into()),
    })
}

fn snapshot_to_domain(model: budget_snapshots::Model) -> Result<BudgetSnapshot, SnapshotError> {
    Ok(BudgetSnapshot {
        id: SnapshotId::from_uuid(model.id),
        budget_id: BudgetId::from_uuid(model.budget_id),
        version_number: model.version_number,
        state: serde_json::from_value(model.snapshot_data).map_err(repo_err)?,
        totals: serde_json::from_value(model.totals).map_err(repo_err)?,
        tax_settings: serde_json::from_value(model.tax_settings).map_err(repo_err)?,
        notes: model.notes,
        created_by: UserId::from_uuid(model.created_by),
        created_at: model.created_at.to_utc(),
    })
}
