//! Template repository: templates with their partidas and conceptos.

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{template_conceptos, template_partidas, templates};
use obra_core::template::{
    Template, TemplateConcepto, TemplateError, TemplatePartida,
    TemplateRepository as TemplateRepoTrait,
};
use obra_shared::types::{TemplateConceptoId, TemplateId, TemplatePartidaId, UserId};

/// Template repository implementation.
#[derive(Debug, Clone)]
pub struct TemplateRepository {
    db: DatabaseConnection,
}

impl TemplateRepository {
    /// Create a new template repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Loads the content of the given template rows.
    async fn with_content(
        &self,
        headers: Vec<templates::Model>,
    ) -> Result<Vec<Template>, TemplateError> {
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        let template_ids: Vec<Uuid> = headers.iter().map(|t| t.id).collect();

        let partida_models = template_partidas::Entity::find()
            .filter(template_partidas::Column::TemplateId.is_in(template_ids))
            .order_by_asc(template_partidas::Column::OrderIndex)
            .all(&self.db)
            .await
            .map_err(repo_err)?;
        let partida_ids: Vec<Uuid> = partida_models.iter().map(|p| p.id).collect();

        let concepto_models = if partida_ids.is_empty() {
            Vec::new()
        } else {
            template_conceptos::Entity::find()
                .filter(template_conceptos::Column::TemplatePartidaId.is_in(partida_ids))
                .order_by_asc(template_conceptos::Column::OrderIndex)
                .all(&self.db)
                .await
                .map_err(repo_err)?
        };

        let owner: HashMap<Uuid, Uuid> = partida_models
            .iter()
            .map(|p| (p.id, p.template_id))
            .collect();
        let mut partidas: HashMap<Uuid, Vec<TemplatePartida>> = HashMap::new();
        for model in partida_models {
            partidas
                .entry(model.template_id)
                .or_default()
                .push(partida_to_domain(model));
        }
        let mut conceptos: HashMap<Uuid, Vec<TemplateConcepto>> = HashMap::new();
        for model in concepto_models {
            if let Some(template_id) = owner.get(&model.template_partida_id) {
                conceptos
                    .entry(*template_id)
                    .or_default()
                    .push(concepto_to_domain(model));
            }
        }

        Ok(headers
            .into_iter()
            .map(|header| Template {
                id: TemplateId::from_uuid(header.id),
                partidas: partidas.remove(&header.id).unwrap_or_default(),
                conceptos: conceptos.remove(&header.id).unwrap_or_default(),
                name: header.name,
                description: header.description,
                created_by: UserId::from_uuid(header.created_by),
                created_at: header.created_at.to_utc(),
                updated_at: header.updated_at.to_utc(),
            })
            .collect())
    }
}

impl TemplateRepoTrait for TemplateRepository {
    async fn insert_template(&self, template: Template) -> Result<Template, TemplateError> {
        let txn = self.db.begin().await.map_err(repo_err)?;

        templates::ActiveModel {
            id: Set(template.id.into_inner()),
            name: Set(template.name.clone()),
            description: Set(template.description.clone()),
            created_by: Set(template.created_by.into_inner()),
            created_at: Set(template.created_at.into()),
            updated_at: Set(template.updated_at.into()),
        }
        .insert(&txn)
        .await
        .map_err(repo_err)?;

        if !template.partidas.is_empty() {
            template_partidas::Entity::insert_many(template.partidas.iter().map(|p| {
                template_partidas::ActiveModel {
                    id: Set(p.id.into_inner()),
                    template_id: Set(p.template_id.into_inner()),
                    name: Set(p.name.clone()),
                    order_index: Set(p.order_index),
                    cost_code: Set(p.cost_code.clone()),
                }
            }))
            .exec(&txn)
            .await
            .map_err(repo_err)?;
        }

        if !template.conceptos.is_empty() {
            template_conceptos::Entity::insert_many(template.conceptos.iter().map(|c| {
                template_conceptos::ActiveModel {
                    id: Set(c.id.into_inner()),
                    template_partida_id: Set(c.template_partida_id.into_inner()),
                    code: Set(c.code.clone()),
                    description: Set(c.description.clone()),
                    long_description: Set(c.long_description.clone()),
                    unit: Set(c.unit.clone()),
                    wbs_code: Set(c.wbs_code.clone()),
                    cantidad: Set(c.cantidad),
                    precio_real: Set(c.precio_real),
                    honorarios_pct: Set(c.honorarios_pct),
                    desperdicio_pct: Set(c.desperdicio_pct),
                    order_index: Set(c.order_index),
                }
            }))
            .exec(&txn)
            .await
            .map_err(repo_err)?;
        }

        txn.commit().await.map_err(repo_err)?;
        Ok(template)
    }

    async fn find_template(&self, id: TemplateId) -> Result<Option<Template>, TemplateError> {
        let Some(header) = templates::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(repo_err)?
        else {
            return Ok(None);
        };
        Ok(self.with_content(vec![header]).await?.pop())
    }

    async fn list_templates(&self) -> Result<Vec<Template>, TemplateError> {
        let headers = templates::Entity::find()
            .order_by_asc(templates::Column::Name)
            .all(&self.db)
            .await
            .map_err(repo_err)?;
        self.with_content(headers).await
    }

    async fn delete_template(&self, id: TemplateId) -> Result<bool, TemplateError> {
        let result = templates::Entity::delete_by_id(id.into_inner())
            .exec(&self.db)
            .await
            .map_err(repo_err)?;
        Ok(result.rows_affected > 0)
    }
}

fn repo_err(e: impl std::fmt::Display) -> TemplateError {
    TemplateError::Repository(e.to_string())
}

fn partida_to_domain(model: template_partidas::Model) -> TemplatePartida {
    TemplatePartida {
        id: TemplatePartidaId::from_uuid(model.id),
        template_id: TemplateId::from_uuid(model.template_id),
        name: model.name,
        order_index: model.order_index,
        cost_code: model.cost_code,
    }
}

fn concepto_to_domain(model: template_conceptos::Model) -> TemplateConcepto {
    TemplateConcepto {
        id: TemplateConceptoId::from_uuid(model.id),
        template_partida_id: TemplatePartidaId::from_uuid(model.template_partida_id),
        code: model.code,
        description: model.description,
        long_description: model.long_description,
        unit: model.unit,
        wbs_code: model.wbs_code,
        cantidad: model.cantidad,
        precio_real: model.precio_real,
        honorarios_pct: model.honorarios_pct,
        desperdicio_pct: model.desperdicio_pct,
        order_index: model.order_index,
    }
}
