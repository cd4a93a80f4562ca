//! Template service: template CRUD, delta and merge.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use obra_shared::EngineConfig;
use obra_shared::types::{
    BudgetId, ConceptoId, PartidaId, TemplateConceptoId, TemplateId, TemplatePartidaId,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::catalog::CostCatalog;
use super::delta;
use super::error::TemplateError;
use super::types::{
    CreateTemplateInput, MergeReport, PartidaTarget, Template, TemplateConcepto, TemplateDelta,
    TemplatePartida,
};
use crate::budget::{
    BudgetBatch, BudgetRepository, BudgetState, Concepto, EffectiveRates, LineItemCalculator,
    Partida, validation,
};

/// Repository trait for template persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait TemplateRepository: Send + Sync {
    /// Insert a template with all of its partidas and conceptos.
    fn insert_template(
        &self,
        template: Template,
    ) -> impl std::future::Future<Output = Result<Template, TemplateError>> + Send;

    /// Find template by ID, with its content.
    fn find_template(
        &self,
        id: TemplateId,
    ) -> impl std::future::Future<Output = Result<Option<Template>, TemplateError>> + Send;

    /// List all templates, with their content, ordered by name.
    fn list_templates(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Template>, TemplateError>> + Send;

    /// Delete a template. Returns false if it did not exist.
    fn delete_template(
        &self,
        id: TemplateId,
    ) -> impl std::future::Future<Output = Result<bool, TemplateError>> + Send;
}

/// Service for managing templates and merging them into budgets.
pub struct TemplateService<T, B>
where
    T: TemplateRepository,
    B: BudgetRepository,
{
    templates: Arc<T>,
    budgets: Arc<B>,
    catalog: Arc<dyn CostCatalog>,
    config: EngineConfig,
}

impl<T, B> TemplateService<T, B>
where
    T: TemplateRepository,
    B: BudgetRepository,
{
    /// Create a new template service.
    #[must_use]
    pub fn new(
        templates: Arc<T>,
        budgets: Arc<B>,
        catalog: Arc<dyn CostCatalog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            templates,
            budgets,
            catalog,
            config,
        }
    }

    /// Create a template with its partidas and conceptos.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty names or descriptions, negative
    /// amounts or out-of-range percentages.
    pub async fn create_template(
        &self,
        input: CreateTemplateInput,
    ) -> Result<Template, TemplateError> {
        validate_template(&input)?;

        let now = Utc::now();
        let template_id = TemplateId::new();
        let mut partidas = Vec::with_capacity(input.partidas.len());
        let mut conceptos = Vec::new();

        for (partida_index, partida_input) in input.partidas.into_iter().enumerate() {
            let partida_id = TemplatePartidaId::new();
            partidas.push(TemplatePartida {
                id: partida_id,
                template_id,
                name: partida_input.name.trim().to_string(),
                order_index: index_to_order(partida_index),
                cost_code: partida_input.cost_code,
            });
            for (concepto_index, concepto_input) in partida_input.conceptos.into_iter().enumerate()
            {
                conceptos.push(TemplateConcepto {
                    id: TemplateConceptoId::new(),
                    template_partida_id: partida_id,
                    code: concepto_input.code,
                    description: concepto_input.description.trim().to_string(),
                    long_description: concepto_input.long_description,
                    unit: concepto_input.unit.trim().to_string(),
                    wbs_code: concepto_input.wbs_code,
                    cantidad: concepto_input.cantidad,
                    precio_real: concepto_input.precio_real,
                    honorarios_pct: concepto_input.honorarios_pct,
                    desperdicio_pct: concepto_input.desperdicio_pct,
                    order_index: index_to_order(concepto_index),
                });
            }
        }

        let template = Template {
            id: template_id,
            name: input.name.trim().to_string(),
            description: input.description,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            partidas,
            conceptos,
        };
        let template = self.templates.insert_template(template).await?;
        info!(
            template_id = %template.id,
            partidas = template.partidas.len(),
            conceptos = template.conceptos.len(),
            "Template created"
        );
        Ok(template)
    }

    /// Get a template with its content.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::NotFound` if the template does not exist.
    pub async fn get_template(&self, id: TemplateId) -> Result<Template, TemplateError> {
        self.templates
            .find_template(id)
            .await?
            .ok_or(TemplateError::NotFound(id))
    }

    /// List all templates.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn list_templates(&self) -> Result<Vec<Template>, TemplateError> {
        self.templates.list_templates().await
    }

    /// Delete a template. Budgets created from it keep their records.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::NotFound` if the template does not exist.
    pub async fn delete_template(&self, id: TemplateId) -> Result<(), TemplateError> {
        if !self.templates.delete_template(id).await? {
            return Err(TemplateError::NotFound(id));
        }
        info!(template_id = %id, "Template deleted");
        Ok(())
    }

    /// Compute what applying a template would add to a budget. Never writes.
    ///
    /// # Errors
    ///
    /// Returns an error if templates are disabled, or the template or budget
    /// does not exist.
    pub async fn calculate_delta(
        &self,
        template_id: TemplateId,
        budget_id: BudgetId,
    ) -> Result<TemplateDelta, TemplateError> {
        let (template, state) = self.load(template_id, budget_id).await?;
        Ok(delta::calculate_delta(
            &template,
            &state,
            self.catalog.as_ref(),
            &self.config.defaults,
        ))
    }

    /// Merge a template into a budget.
    ///
    /// Only adds: missing partidas and conceptos are created and empty
    /// fields of matched conceptos are filled. Existing values, quantities
    /// and prices are never overwritten, so applying the same template twice
    /// writes nothing the second time. All writes happen in one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Templates are disabled
    /// - The template or budget does not exist
    /// - The budget is closed
    /// - The write fails (nothing is written)
    pub async fn apply_template(
        &self,
        template_id: TemplateId,
        budget_id: BudgetId,
    ) -> Result<MergeReport, TemplateError> {
        let (template, state) = self.load(template_id, budget_id).await?;
        if !state.budget.status.is_editable() {
            return Err(TemplateError::BudgetClosed(budget_id));
        }

        let delta = delta::calculate_delta(
            &template,
            &state,
            self.catalog.as_ref(),
            &self.config.defaults,
        );
        let mut report = MergeReport {
            partidas_created: Vec::new(),
            conceptos_created: Vec::new(),
            conceptos_updated: Vec::new(),
            unmapped: delta.unmapped.clone(),
        };
        if delta.is_empty() {
            debug!(template_id = %template_id, budget_id = %budget_id, "Template already applied");
            return Ok(report);
        }

        let batch = build_batch(&state, delta)?;
        report.partidas_created = batch.new_partidas.iter().map(|p| p.id).collect();
        report.conceptos_created = batch.new_conceptos.iter().map(|c| c.id).collect();
        report.conceptos_updated = batch.updated_conceptos.iter().map(|c| c.id).collect();

        self.budgets.apply_batch(batch).await?;
        info!(
            template_id = %template_id,
            budget_id = %budget_id,
            partidas_created = report.partidas_created.len(),
            conceptos_created = report.conceptos_created.len(),
            conceptos_updated = report.conceptos_updated.len(),
            unmapped = report.unmapped.len(),
            "Template applied"
        );
        Ok(report)
    }

    async fn load(
        &self,
        template_id: TemplateId,
        budget_id: BudgetId,
    ) -> Result<(Template, BudgetState), TemplateError> {
        if !self.config.features.templates {
            return Err(TemplateError::Disabled);
        }
        let template = self.get_template(template_id).await?;
        let state = self
            .budgets
            .load_state(budget_id)
            .await?
            .ok_or(TemplateError::BudgetNotFound(budget_id))?;
        Ok((template, state))
    }
}

/// Turns a delta into budget records. New partidas go after the existing
/// ones; new conceptos go after the existing conceptos of their partida.
fn build_batch(
    state: &BudgetState,
    delta: TemplateDelta,
) -> Result<BudgetBatch, validation::ValidationError> {
    let now = Utc::now();
    let mut batch = BudgetBatch::default();

    let mut next_partida_order = state
        .partidas
        .iter()
        .map(|p| p.order_index + 1)
        .max()
        .unwrap_or(0);
    let mut created: HashMap<TemplatePartidaId, PartidaId> = HashMap::new();
    for to_add in delta.partidas_to_add {
        let partida = Partida {
            id: PartidaId::new(),
            budget_id: state.budget.id,
            name: to_add.name,
            order_index: next_partida_order,
            is_active: true,
            notes: None,
            honorarios_pct_override: None,
            desperdicio_pct_override: None,
            cost_code: to_add.cost_code,
            template_partida_id: Some(to_add.template_partida_id),
            created_at: now,
            updated_at: now,
        };
        next_partida_order += 1;
        created.insert(to_add.template_partida_id, partida.id);
        batch.new_partidas.push(partida);
    }

    let mut next_concepto_order: HashMap<PartidaId, i32> = HashMap::new();
    for concepto in &state.conceptos {
        let next = next_concepto_order.entry(concepto.partida_id).or_insert(0);
        *next = (*next).max(concepto.order_index + 1);
    }

    for to_add in delta.conceptos_to_add {
        let partida_id = match to_add.target {
            PartidaTarget::Existing(id) => id,
            PartidaTarget::New(template_partida_id) => match created.get(&template_partida_id) {
                Some(id) => *id,
                None => continue,
            },
        };
        let order = next_concepto_order.entry(partida_id).or_insert(0);
        let order_index = *order;
        *order += 1;

        let rates = EffectiveRates {
            honorarios_pct: to_add.honorarios_pct,
            desperdicio_pct: to_add.desperdicio_pct,
        };
        let mut concepto = Concepto {
            id: ConceptoId::new(),
            partida_id,
            code: to_add.code,
            description: to_add.description,
            long_description: to_add.long_description,
            unit: to_add.unit,
            provider: None,
            is_active: true,
            is_sumable: true,
            order_index,
            properties: serde_json::Map::new(),
            wbs_code: to_add.wbs_code,
            template_concepto_id: Some(to_add.template_concepto_id),
            cantidad_real: to_add.cantidad_real,
            desperdicio_pct: Some(to_add.desperdicio_pct),
            precio_real: to_add.precio_real,
            honorarios_pct: Some(to_add.honorarios_pct),
            cantidad: Decimal::ZERO,
            pu: Decimal::ZERO,
            total_real: Decimal::ZERO,
            total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        LineItemCalculator::recompute(&mut concepto, rates)?;
        batch.new_conceptos.push(concepto);
    }

    for fill in delta.existing_conceptos_to_update {
        let Some(existing) = state.concepto(fill.concepto_id) else {
            continue;
        };
        let mut concepto = existing.clone();
        if let Some(wbs_code) = fill.wbs_code {
            concepto.wbs_code = Some(wbs_code);
        }
        if let Some(unit) = fill.unit {
            concepto.unit = unit;
        }
        if let Some(long_description) = fill.long_description {
            concepto.long_description = Some(long_description);
        }
        if concepto.template_concepto_id.is_none() {
            concepto.template_concepto_id = Some(fill.template_concepto_id);
        }
        concepto.updated_at = now;
        batch.updated_conceptos.push(concepto);
    }

    Ok(batch)
}

fn index_to_order(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

fn validate_template(input: &CreateTemplateInput) -> Result<(), validation::ValidationError> {
    validation::require_non_empty("name", &input.name)?;
    for (i, partida) in input.partidas.iter().enumerate() {
        validation::require_non_empty(&format!("partidas[{i}].name"), &partida.name)?;
        for (j, concepto) in partida.conceptos.iter().enumerate() {
            let field = |name: &str| format!("partidas[{i}].conceptos[{j}].{name}");
            validation::require_non_empty(&field("description"), &concepto.description)?;
            validation::require_non_empty(&field("unit"), &concepto.unit)?;
            validation::require_amount(&field("cantidad"), concepto.cantidad)?;
            validation::require_amount(&field("precio_real"), concepto.precio_real)?;
            if let Some(pct) = concepto.honorarios_pct {
                validation::require_fraction(&field("honorarios_pct"), pct)?;
            }
            if let Some(pct) = concepto.desperdicio_pct {
                validation::require_fraction(&field("desperdicio_pct"), pct)?;
            }
        }
    }
    Ok(())
}
