//! Budget repository: budgets, partidas and conceptos.

use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{budgets, conceptos, partidas};
use obra_core::budget::{
    Budget, BudgetBatch, BudgetError, BudgetRepository as BudgetRepoTrait, BudgetState,
    BudgetStatus, Concepto, Partida, apply_budget_edit,
};
use obra_shared::types::{
    BudgetId, ClientId, ConceptoId, PartidaId, ProjectId, TemplateConceptoId, TemplatePartidaId,
    UserId,
};

/// Budget repository implementation.
#[derive(Debug, Clone)]
pub struct BudgetRepository {
    db: DatabaseConnection,
}

impl BudgetRepository {
    /// Create a new budget repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn write_batch(txn: &DatabaseTransaction, batch: BudgetBatch) -> Result<(), BudgetError> {
        if let Some(edited) = batch.budget {
            // Row lock orders the edit against a concurrent publish or close.
            let Some(model) = budgets::Entity::find_by_id(edited.id.into_inner())
                .lock_exclusive()
                .one(txn)
                .await
                .map_err(repo_err)?
            else {
                return Err(BudgetError::NotFound(edited.id));
            };
            let merged = apply_budget_edit(&budget_to_domain(model)?, edited)?;
            budget_edit_active_model(&merged)?
                .update(txn)
                .await
                .map_err(repo_err)?;
        }

        if !batch.new_partidas.is_empty() {
            partidas::Entity::insert_many(batch.new_partidas.iter().map(partida_active_model))
                .exec(txn)
                .await
                .map_err(repo_err)?;
        }
        for partida in &batch.updated_partidas {
            partida_active_model(partida)
                .update(txn)
                .await
                .map_err(repo_err)?;
        }

        if !batch.new_conceptos.is_empty() {
            conceptos::Entity::insert_many(batch.new_conceptos.iter().map(concepto_active_model))
                .exec(txn)
                .await
                .map_err(repo_err)?;
        }
        for concepto in &batch.updated_conceptos {
            concepto_active_model(concepto)
                .update(txn)
                .await
                .map_err(repo_err)?;
        }
        Ok(())
    }
}

impl BudgetRepoTrait for BudgetRepository {
    async fn insert_budget(&self, budget: Budget) -> Result<Budget, BudgetError> {
        let model = budget_active_model(&budget)?
            .insert(&self.db)
            .await
            .map_err(repo_err)?;
        budget_to_domain(model)
    }

    async fn find_budget(&self, id: BudgetId) -> Result<Option<Budget>, BudgetError> {
        budgets::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(repo_err)?
            .map(budget_to_domain)
            .transpose()
    }

    async fn find_partida(&self, id: PartidaId) -> Result<Option<Partida>, BudgetError> {
        let model = partidas::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(model.map(partida_to_domain))
    }

    async fn find_concepto(&self, id: ConceptoId) -> Result<Option<Concepto>, BudgetError> {
        let model = conceptos::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(model.map(concepto_to_domain))
    }

    async fn load_state(&self, id: BudgetId) -> Result<Option<BudgetState>, BudgetError> {
        let Some(budget) = self.find_budget(id).await? else {
            return Ok(None);
        };

        let partida_models = partidas::Entity::find()
            .filter(partidas::Column::BudgetId.eq(id.into_inner()))
            .order_by_asc(partidas::Column::OrderIndex)
            .order_by_asc(partidas::Column::Id)
            .all(&self.db)
            .await
            .map_err(repo_err)?;
        let partida_ids: Vec<Uuid> = partida_models.iter().map(|p| p.id).collect();

        let concepto_models = if partida_ids.is_empty() {
            Vec::new()
        } else {
            conceptos::Entity::find()
                .filter(conceptos::Column::PartidaId.is_in(partida_ids))
                .order_by_asc(conceptos::Column::OrderIndex)
                .order_by_asc(conceptos::Column::Id)
                .all(&self.db)
                .await
                .map_err(repo_err)?
        };

        Ok(Some(BudgetState {
            budget,
            partidas: partida_models.into_iter().map(partida_to_domain).collect(),
            conceptos: concepto_models.into_iter().map(concepto_to_domain).collect(),
        }))
    }

    async fn apply_batch(&self, batch: BudgetBatch) -> Result<(), BudgetError> {
        if batch.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin().await.map_err(repo_err)?;
        Self::write_batch(&txn, batch).await?;
        txn.commit().await.map_err(repo_err)?;
        Ok(())
    }

    async fn delete_partida_cascade(&self, id: PartidaId) -> Result<u64, BudgetError> {
        let txn = self.db.begin().await.map_err(repo_err)?;

        let removed = conceptos::Entity::delete_many()
            .filter(conceptos::Column::PartidaId.eq(id.into_inner()))
            .exec(&txn)
            .await
            .map_err(repo_err)?
            .rows_affected;
        let deleted = partidas::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(repo_err)?
            .rows_affected;
        if deleted == 0 {
            txn.rollback().await.map_err(repo_err)?;
            return Err(BudgetError::PartidaNotFound(id));
        }

        txn.commit().await.map_err(repo_err)?;
        debug!(partida_id = %id, conceptos_removed = removed, "Partida cascade committed");
        Ok(removed)
    }

    async fn delete_concepto(&self, id: ConceptoId) -> Result<bool, BudgetError> {
        let result = conceptos::Entity::delete_by_id(id.into_inner())
            .exec(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(result.rows_affected > 0)
    }
}

fn repo_err(e: impl std::fmt::Display) -> BudgetError {
    BudgetError::Repository(e.to_string())
}

pub(crate) fn budget_active_model(budget: &Budget) -> Result<budgets::ActiveModel, BudgetError> {
    let settings = serde_json::to_value(&budget.settings).map_err(repo_err)?;
    Ok(budgets::ActiveModel {
        id: Set(budget.id.into_inner()),
        project_id: Set(budget.project_id.map(ProjectId::into_inner)),
        client_id: Set(budget.client_id.map(ClientId::into_inner)),
        name: Set(budget.name.clone()),
        currency: Set(budget.currency.code().to_string()),
        status: Set(budget.status.as_str().to_string()),
        settings: Set(settings),
        created_by: Set(budget.created_by.into_inner()),
        created_at: Set(budget.created_at.into()),
        updated_at: Set(budget.updated_at.into()),
    })
}

/// Only the columns a budget edit may change; status stays with publish and close.
fn budget_edit_active_model(budget: &Budget) -> Result<budgets::ActiveModel, BudgetError> {
    let settings = serde_json::to_value(&budget.settings).map_err(repo_err)?;
    Ok(budgets::ActiveModel {
        id: Unchanged(budget.id.into_inner()),
        name: Set(budget.name.clone()),
        settings: Set(settings),
        updated_at: Set(budget.updated_at.into()),
        ..Default::default()
    })
}

pub(crate) fn budget_to_domain(model: budgets::Model) -> Result<Budget, BudgetError> {
    let status = BudgetStatus::parse(&model.status)
        .ok_or_else(|| BudgetError::Repository(format!("Unknown budget status: {}", model.status)))?;
    let currency = model.currency.parse().map_err(BudgetError::Repository)?;
    let settings = serde_json::from_value(model.settings).map_err(repo_err)?;
    Ok(Budget {
        id: BudgetId::from_uuid(model.id),
        project_id: model.project_id.map(ProjectId::from_uuid),
        client_id: model.client_id.map(ClientId::from_uuid),
        name: model.name,
        currency,
        status,
        settings,
        created_by: UserId::from_uuid(model.created_by),
        created_at: model.created_at.to_utc(),
        updated_at: model.updated_at.to_utc(),
    })
}

fn partida_active_model(partida: &Partida) -> partidas::ActiveModel {
    partidas::ActiveModel {
        id: Set(partida.id.into_inner()),
        budget_id: Set(partida.budget_id.into_inner()),
        name: Set(partida.name.clone()),
        order_index: Set(partida.order_index),
        is_active: Set(partida.is_active),
        notes: Set(partida.notes.clone()),
        honorarios_pct_override: Set(partida.honorarios_pct_override),
        desperdicio_pct_override: Set(partida.desperdicio_pct_override),
        cost_code: Set(partida.cost_code.clone()),
        template_partida_id: Set(partida.template_partida_id.map(TemplatePartidaId::into_inner)),
        created_at: Set(partida.created_at.into()),
        updated_at: Set(partida.updated_at.into()),
    }
}

fn partida_to_domain(model: partidas::Model) -> Partida {
    Partida {
        id: PartidaId::from_uuid(model.id),
        budget_id: BudgetId::from_uuid(model.budget_id),
        name: model.name,
        order_index: model.order_index,
        is_active: model.is_active,
        notes: model.notes,
        honorarios_pct_override: model.honorarios_pct_override,
        desperdicio_pct_override: model.desperdicio_pct_override,
        cost_code: model.cost_code,
        template_partida_id: model.template_partida_id.map(TemplatePartidaId::from_uuid),
        created_at: model.created_at.to_utc(),
        updated_at: model.updated_at.to_utc(),
    }
}

fn concepto_active_model(concepto: &Concepto) -> conceptos::ActiveModel {
    conceptos::ActiveModel {
        id: Set(concepto.id.into_inner()),
        partida_id: Set(concepto.partida_id.into_inner()),
        code: Set(concepto.code.clone()),
        description: Set(concepto.description.clone()),
        long_description: Set(concepto.long_description.clone()),
        unit: Set(concepto.unit.clone()),
        provider: Set(concepto.provider.clone()),
        is_active: Set(concepto.is_active),
        is_sumable: Set(concepto.is_sumable),
        order_index: Set(concepto.order_index),
        properties: Set(Value::Object(concepto.properties.clone())),
        wbs_code: Set(concepto.wbs_code.clone()),
        template_concepto_id: Set(concepto.template_concepto_id.map(TemplateConceptoId::into_inner)),
        cantidad_real: Set(concepto.cantidad_real),
        desperdicio_pct: Set(concepto.desperdicio_pct),
        precio_real: Set(concepto.precio_real),
        honorarios_pct: Set(concepto.honorarios_pct),
        cantidad: Set(concepto.cantidad),
        pu: Set(concepto.pu),
        total_real: Set(concepto.total_real),
        total: Set(concepto.total),
        created_at: Set(concepto.created_at.into()),
        updated_at: Set(concepto.updated_at.into()),
    }
}

fn concepto_to_domain(model: conceptos::Model) -> Concepto {
    let properties = match model.properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Concepto {
        id: ConceptoId::from_uuid(model.id),
        partida_id: PartidaId::from_uuid(model.partida_id),
        code: model.code,
        description: model.description,
        long_description: model.long_description,
        unit: model.unit,
        provider: model.provider,
        is_active: model.is_active,
        is_sumable: model.is_sumable,
        order_index: model.order_index,
        properties,
        wbs_code: model.wbs_code,
        template_concepto_id: model.template_concepto_id.map(TemplateConceptoId::from_uuid),
        cantidad_real: model.cantidad_real,
        desperdicio_pct: model.desperdicio_pct,
        precio_real: model.precio_real,
        honorarios_pct: model.honorarios_pct,
        cantidad: model.cantidad,
        pu: model.pu,
        total_real: model.total_real,
        total: model.total,
        created_at: model.created_at.to_utc(),
        updated_at: model.updated_at.to_utc(),
    }
}
