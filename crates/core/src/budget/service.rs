//! Budget editing service.

use std::sync::Arc;

use chrono::Utc;
use obra_shared::EngineConfig;
use obra_shared::types::{BudgetId, ConceptoId, PartidaId};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::aggregation::{BudgetAggregator, BudgetTotals, CostMayorTotals};
use super::defaults::{DefaultsResolver, EffectiveRates, PartidaOverrides};
use super::error::BudgetError;
use super::line_item::LineItemCalculator;
use super::types::{
    Budget, BudgetBatch, BudgetState, BudgetStatus, Concepto, CreateBudgetInput,
    CreateConceptoInput, CreatePartidaInput, Partida, UpdateBudgetInput, UpdateConceptoInput,
    UpdatePartidaInput,
};
use super::validation::{self, ValidationError};

/// Repository trait for budget persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait BudgetRepository: Send + Sync {
    /// Insert a new budget.
    fn insert_budget(
        &self,
        budget: Budget,
    ) -> impl std::future::Future<Output = Result<Budget, BudgetError>> + Send;

    /// Find budget by ID.
    fn find_budget(
        &self,
        id: BudgetId,
    ) -> impl std::future::Future<Output = Result<Option<Budget>, BudgetError>> + Send;

    /// Find partida by ID.
    fn find_partida(
        &self,
        id: PartidaId,
    ) -> impl std::future::Future<Output = Result<Option<Partida>, BudgetError>> + Send;

    /// Find concepto by ID.
    fn find_concepto(
        &self,
        id: ConceptoId,
    ) -> impl std::future::Future<Output = Result<Option<Concepto>, BudgetError>> + Send;

    /// Load a budget with all of its partidas and conceptos.
    fn load_state(
        &self,
        id: BudgetId,
    ) -> impl std::future::Future<Output = Result<Option<BudgetState>, BudgetError>> + Send;

    /// Write every record of the batch in one transaction.
    fn apply_batch(
        &self,
        batch: BudgetBatch,
    ) -> impl std::future::Future<Output = Result<(), BudgetError>> + Send;

    /// Delete a partida and all of its conceptos in one transaction.
    ///
    /// Returns the number of conceptos removed.
    fn delete_partida_cascade(
        &self,
        id: PartidaId,
    ) -> impl std::future::Future<Output = Result<u64, BudgetError>> + Send;

    /// Delete a concepto. Returns false if it did not exist.
    fn delete_concepto(
        &self,
        id: ConceptoId,
    ) -> impl std::future::Future<Output = Result<bool, BudgetError>> + Send;
}

/// Merges an edited budget onto the currently stored one.
///
/// Repositories call this while holding the budget row, so the result is
/// decided against the committed status rather than the copy the edit was
/// based on. Only `name`, `settings` and `updated_at` are taken from
/// `edited`; `status` always stays as stored, and once the budget has been
/// published its stored tax settings are kept.
///
/// # Errors
///
/// Returns `BudgetError::BudgetClosed` if the stored budget is closed.
pub fn apply_budget_edit(current: &Budget, edited: Budget) -> Result<Budget, BudgetError> {
    if !current.status.is_editable() {
        return Err(BudgetError::BudgetClosed(current.id));
    }
    let mut merged = current.clone();
    merged.name = edited.name;
    merged.updated_at = edited.updated_at;
    let frozen_tax = current.settings.tax;
    merged.settings = edited.settings;
    if !current.status.tax_settings_editable() {
        if merged.settings.tax != frozen_tax {
            warn!(budget_id = %current.id, "Keeping tax settings frozen by publication");
        }
        merged.settings.tax = frozen_tax;
    }
    Ok(merged)
}

/// Service for editing budgets, partidas and conceptos.
///
/// Every edit recomputes the derived fields it affects before writing, so
/// stored `cantidad`, `pu`, `total_real` and `total` are always current.
pub struct BudgetService<R: BudgetRepository> {
    repo: Arc<R>,
    config: EngineConfig,
}

impl<R: BudgetRepository> BudgetService<R> {
    /// Create a new budget service.
    #[must_use]
    pub fn new(repo: Arc<R>, config: EngineConfig) -> Self {
        Self { repo, config }
    }

    /// Create a draft budget.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty name or out-of-range settings.
    pub async fn create_budget(&self, input: CreateBudgetInput) -> Result<Budget, BudgetError> {
        validation::require_non_empty("name", &input.name)?;
        validation::validate_settings(&input.settings)?;

        let now = Utc::now();
        let budget = Budget {
            id: BudgetId::new(),
            project_id: input.project_id,
            client_id: input.client_id,
            name: input.name.trim().to_string(),
            currency: input.currency,
            status: BudgetStatus::Draft,
            settings: input.settings,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };

        let budget = self.repo.insert_budget(budget).await?;
        info!(budget_id = %budget.id, name = %budget.name, "Budget created");
        Ok(budget)
    }

    /// Get a budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn get_budget(&self, id: BudgetId) -> Result<Budget, BudgetError> {
        self.repo
            .find_budget(id)
            .await?
            .ok_or(BudgetError::NotFound(id))
    }

    /// Get a budget with all partidas and conceptos.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn get_state(&self, id: BudgetId) -> Result<BudgetState, BudgetError> {
        self.repo
            .load_state(id)
            .await?
            .ok_or(BudgetError::NotFound(id))
    }

    /// Update a budget's name or settings.
    ///
    /// Changing a default percentage recomputes every concepto that
    /// inherits it, in the same write as the settings change.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The budget does not exist or is closed
    /// - The new settings are out of range
    /// - The tax settings change on a published budget
    pub async fn update_budget(
        &self,
        id: BudgetId,
        input: UpdateBudgetInput,
    ) -> Result<Budget, BudgetError> {
        let mut state = self.get_state(id).await?;
        Self::ensure_editable(&state.budget)?;

        if let Some(name) = input.name {
            validation::require_non_empty("name", &name)?;
            state.budget.name = name.trim().to_string();
        }

        let mut updated_conceptos = Vec::new();
        if let Some(settings) = input.settings {
            validation::validate_settings(&settings)?;
            if !state.budget.status.tax_settings_editable()
                && settings.tax != state.budget.settings.tax
            {
                return Err(BudgetError::TaxSettingsLocked(id));
            }

            let defaults_changed = settings.honorarios_pct_default
                != state.budget.settings.honorarios_pct_default
                || settings.desperdicio_pct_default != state.budget.settings.desperdicio_pct_default;
            state.budget.settings = settings;

            if defaults_changed {
                updated_conceptos = self.recompute_all(&mut state)?;
            }
        }

        state.budget.updated_at = Utc::now();
        debug!(
            budget_id = %id,
            recomputed = updated_conceptos.len(),
            "Updating budget"
        );

        self.repo
            .apply_batch(BudgetBatch {
                budget: Some(state.budget.clone()),
                updated_conceptos,
                ..BudgetBatch::default()
            })
            .await?;
        Ok(state.budget)
    }

    /// Add a partida to a budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the budget does not exist or is closed, or if the
    /// input is invalid.
    pub async fn add_partida(
        &self,
        budget_id: BudgetId,
        input: CreatePartidaInput,
    ) -> Result<Partida, BudgetError> {
        validation::validate_create_partida(&input)?;
        let state = self.get_state(budget_id).await?;
        Self::ensure_editable(&state.budget)?;

        let order_index = input.order_index.unwrap_or_else(|| {
            state
                .partidas
                .iter()
                .map(|p| p.order_index + 1)
                .max()
                .unwrap_or(0)
        });
        let now = Utc::now();
        let partida = Partida {
            id: PartidaId::new(),
            budget_id,
            name: input.name.trim().to_string(),
            order_index,
            is_active: true,
            notes: input.notes,
            honorarios_pct_override: input.honorarios_pct_override,
            desperdicio_pct_override: input.desperdicio_pct_override,
            cost_code: input.cost_code,
            template_partida_id: None,
            created_at: now,
            updated_at: now,
        };

        self.repo
            .apply_batch(BudgetBatch {
                new_partidas: vec![partida.clone()],
                ..BudgetBatch::default()
            })
            .await?;
        debug!(budget_id = %budget_id, partida_id = %partida.id, "Partida added");
        Ok(partida)
    }

    /// Update a partida.
    ///
    /// Changing an override recomputes the partida's conceptos that inherit it.
    ///
    /// # Errors
    ///
    /// Returns an error if the partida or its budget does not exist, the
    /// budget is closed, or the input is invalid.
    pub async fn update_partida(
        &self,
        id: PartidaId,
        input: UpdatePartidaInput,
    ) -> Result<Partida, BudgetError> {
        validation::validate_update_partida(&input)?;
        let partida = self
            .repo
            .find_partida(id)
            .await?
            .ok_or(BudgetError::PartidaNotFound(id))?;
        let mut state = self.get_state(partida.budget_id).await?;
        Self::ensure_editable(&state.budget)?;

        let Some(partida) = state.partidas.iter_mut().find(|p| p.id == id) else {
            return Err(BudgetError::PartidaNotFound(id));
        };
        let before = PartidaOverrides::from(&*partida);

        if let Some(name) = input.name {
            partida.name = name.trim().to_string();
        }
        if let Some(order_index) = input.order_index {
            partida.order_index = order_index;
        }
        if let Some(is_active) = input.is_active {
            partida.is_active = is_active;
        }
        if let Some(notes) = input.notes {
            partida.notes = notes;
        }
        if let Some(value) = input.honorarios_pct_override {
            partida.honorarios_pct_override = value;
        }
        if let Some(value) = input.desperdicio_pct_override {
            partida.desperdicio_pct_override = value;
        }
        if let Some(cost_code) = input.cost_code {
            partida.cost_code = cost_code;
        }
        partida.updated_at = Utc::now();
        let partida = partida.clone();

        let updated_conceptos = if PartidaOverrides::from(&partida) == before {
            Vec::new()
        } else {
            let inherited = self.inherited_rates(&state.budget, &partida);
            Self::recompute_conceptos(
                state.conceptos.iter_mut().filter(|c| c.partida_id == id),
                inherited,
            )?
        };

        self.repo
            .apply_batch(BudgetBatch {
                updated_partidas: vec![partida.clone()],
                updated_conceptos,
                ..BudgetBatch::default()
            })
            .await?;
        Ok(partida)
    }

    /// Delete a partida together with its conceptos.
    ///
    /// # Errors
    ///
    /// Returns an error if the partida does not exist or its budget is closed.
    pub async fn delete_partida(&self, id: PartidaId) -> Result<u64, BudgetError> {
        let partida = self
            .repo
            .find_partida(id)
            .await?
            .ok_or(BudgetError::PartidaNotFound(id))?;
        let budget = self.get_budget(partida.budget_id).await?;
        Self::ensure_editable(&budget)?;

        let removed = self.repo.delete_partida_cascade(id).await?;
        info!(
            budget_id = %budget.id,
            partida_id = %id,
            conceptos_removed = removed,
            "Partida deleted"
        );
        Ok(removed)
    }

    /// Add a concepto to a partida, computing its derived fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the partida or its budget does not exist, the
    /// budget is closed, or the input is invalid.
    pub async fn add_concepto(
        &self,
        partida_id: PartidaId,
        input: CreateConceptoInput,
    ) -> Result<Concepto, BudgetError> {
        validation::validate_create_concepto(&input)?;
        let state = self.state_for_partida(partida_id).await?;
        let Some(partida) = state.partida(partida_id) else {
            return Err(BudgetError::PartidaNotFound(partida_id));
        };

        let order_index = input.order_index.unwrap_or_else(|| {
            state
                .conceptos_of(partida_id)
                .iter()
                .map(|c| c.order_index + 1)
                .max()
                .unwrap_or(0)
        });
        let now = Utc::now();
        let mut concepto = Concepto {
            id: ConceptoId::new(),
            partida_id,
            code: input.code,
            description: input.description.trim().to_string(),
            long_description: input.long_description,
            unit: input.unit.trim().to_string(),
            provider: input.provider,
            is_active: true,
            is_sumable: input.is_sumable,
            order_index,
            properties: input.properties,
            wbs_code: input.wbs_code,
            template_concepto_id: None,
            cantidad_real: input.cantidad_real,
            desperdicio_pct: input.desperdicio_pct,
            precio_real: input.precio_real,
            honorarios_pct: input.honorarios_pct,
            cantidad: Decimal::ZERO,
            pu: Decimal::ZERO,
            total_real: Decimal::ZERO,
            total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        LineItemCalculator::recompute(&mut concepto, self.inherited_rates(&state.budget, partida))?;

        self.repo
            .apply_batch(BudgetBatch {
                new_conceptos: vec![concepto.clone()],
                ..BudgetBatch::default()
            })
            .await?;
        Ok(concepto)
    }

    /// Update a concepto's inputs and recompute its derived fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the concepto, its partida or its budget does not
    /// exist, the budget is closed, or the input is invalid.
    pub async fn update_concepto(
        &self,
        id: ConceptoId,
        input: UpdateConceptoInput,
    ) -> Result<Concepto, BudgetError> {
        validation::validate_update_concepto(&input)?;
        let mut concepto = self
            .repo
            .find_concepto(id)
            .await?
            .ok_or(BudgetError::ConceptoNotFound(id))?;
        let state = self.state_for_partida(concepto.partida_id).await?;
        let Some(partida) = state.partida(concepto.partida_id) else {
            return Err(BudgetError::PartidaNotFound(concepto.partida_id));
        };

        if let Some(code) = input.code {
            concepto.code = code;
        }
        if let Some(description) = input.description {
            concepto.description = description.trim().to_string();
        }
        if let Some(long_description) = input.long_description {
            concepto.long_description = long_description;
        }
        if let Some(unit) = input.unit {
            concepto.unit = unit.trim().to_string();
        }
        if let Some(provider) = input.provider {
            concepto.provider = provider;
        }
        if let Some(wbs_code) = input.wbs_code {
            concepto.wbs_code = wbs_code;
        }
        if let Some(cantidad_real) = input.cantidad_real {
            concepto.cantidad_real = cantidad_real;
        }
        if let Some(precio_real) = input.precio_real {
            concepto.precio_real = precio_real;
        }
        if let Some(honorarios_pct) = input.honorarios_pct {
            concepto.honorarios_pct = honorarios_pct;
        }
        if let Some(desperdicio_pct) = input.desperdicio_pct {
            concepto.desperdicio_pct = desperdicio_pct;
        }
        if let Some(is_active) = input.is_active {
            concepto.is_active = is_active;
        }
        if let Some(is_sumable) = input.is_sumable {
            concepto.is_sumable = is_sumable;
        }
        if let Some(order_index) = input.order_index {
            concepto.order_index = order_index;
        }
        if let Some(properties) = input.properties {
            concepto.properties = properties;
        }
        concepto.updated_at = Utc::now();
        LineItemCalculator::recompute(&mut concepto, self.inherited_rates(&state.budget, partida))?;

        self.repo
            .apply_batch(BudgetBatch {
                updated_conceptos: vec![concepto.clone()],
                ..BudgetBatch::default()
            })
            .await?;
        Ok(concepto)
    }

    /// Delete a concepto.
    ///
    /// # Errors
    ///
    /// Returns an error if the concepto does not exist or its budget is closed.
    pub async fn delete_concepto(&self, id: ConceptoId) -> Result<(), BudgetError> {
        let concepto = self
            .repo
            .find_concepto(id)
            .await?
            .ok_or(BudgetError::ConceptoNotFound(id))?;
        self.state_for_partida(concepto.partida_id).await?;

        if !self.repo.delete_concepto(id).await? {
            return Err(BudgetError::ConceptoNotFound(id));
        }
        Ok(())
    }

    /// Calculate budget totals.
    ///
    /// Omitted rates fall back to the budget's stored tax settings and then
    /// to the configured tax policy. Never writes.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn calculate_totals(
        &self,
        budget_id: BudgetId,
        iva_rate: Option<Decimal>,
        retenciones_rate: Option<Decimal>,
    ) -> Result<BudgetTotals, BudgetError> {
        let state = self.get_state(budget_id).await?;
        let rates = BudgetAggregator::resolve_rates(
            iva_rate,
            retenciones_rate,
            &state.budget.settings,
            &self.config.tax,
        );
        Ok(BudgetAggregator::calculate(&state, rates))
    }

    /// Calculate totals grouped by the budget's cost-mayor whitelist.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NotFound` if the budget does not exist.
    pub async fn totals_by_cost_mayor(
        &self,
        budget_id: BudgetId,
    ) -> Result<CostMayorTotals, BudgetError> {
        let state = self.get_state(budget_id).await?;
        Ok(BudgetAggregator::group_by_cost_mayor(&state))
    }

    /// Rates a partida passes down to its conceptos.
    #[must_use]
    pub fn inherited_rates(&self, budget: &Budget, partida: &Partida) -> EffectiveRates {
        DefaultsResolver::resolve(
            &budget.settings,
            PartidaOverrides::from(partida),
            &self.config.defaults,
        )
    }

    /// Recomputes every concepto that inherits a rate, returning the ones
    /// whose derived fields changed.
    fn recompute_all(&self, state: &mut BudgetState) -> Result<Vec<Concepto>, ValidationError> {
        let mut changed = Vec::new();
        for partida in &state.partidas {
            let inherited = self.inherited_rates(&state.budget, partida);
            changed.extend(Self::recompute_conceptos(
                state
                    .conceptos
                    .iter_mut()
                    .filter(|c| c.partida_id == partida.id),
                inherited,
            )?);
        }
        Ok(changed)
    }

    fn recompute_conceptos<'a>(
        conceptos: impl Iterator<Item = &'a mut Concepto>,
        inherited: EffectiveRates,
    ) -> Result<Vec<Concepto>, ValidationError> {
        let now = Utc::now();
        let mut changed = Vec::new();
        for concepto in conceptos.filter(|c| DefaultsResolver::inherits(c)) {
            if LineItemCalculator::recompute(concepto, inherited)? {
                concepto.updated_at = now;
                changed.push(concepto.clone());
            }
        }
        Ok(changed)
    }

    async fn state_for_partida(&self, partida_id: PartidaId) -> Result<BudgetState, BudgetError> {
        let partida = self
            .repo
            .find_partida(partida_id)
            .await?
            .ok_or(BudgetError::PartidaNotFound(partida_id))?;
        let state = self.get_state(partida.budget_id).await?;
        Self::ensure_editable(&state.budget)?;
        Ok(state)
    }

    /// Rejects edits to closed budgets.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::BudgetClosed` if the budget is closed.
    pub fn ensure_editable(budget: &Budget) -> Result<(), BudgetError> {
        if budget.status.is_editable() {
            Ok(())
        } else {
            Err(BudgetError::BudgetClosed(budget.id))
        }
    }
}
