//! In-memory repository and record builders shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use obra_shared::types::{BudgetId, ConceptoId, PartidaId, SnapshotId, TemplateId};

use crate::budget::{
    Budget, BudgetBatch, BudgetError, BudgetRepository, BudgetState, BudgetStatus, Concepto,
    Partida, apply_budget_edit,
};
use crate::pricing::{PriceObservation, PriceObservationRepository, PricingError};
use crate::snapshot::{BudgetSnapshot, NewSnapshot, SnapshotError, SnapshotRepository};
use crate::template::{Template, TemplateError, TemplateRepository};

#[derive(Default)]
struct Tables {
    budgets: HashMap<BudgetId, Budget>,
    partidas: HashMap<PartidaId, Partida>,
    conceptos: HashMap<ConceptoId, Concepto>,
    snapshots: HashMap<SnapshotId, BudgetSnapshot>,
    observations: Vec<PriceObservation>,
    templates: HashMap<TemplateId, Template>,
}

#[derive(Default)]
struct Faults {
    read_delay: Option<Duration>,
    fail_observation_reads: bool,
    fail_observation_writes: bool,
    fail_snapshot_commits: bool,
}

/// Single store implementing every repository trait, so services under test
/// share one view of the data.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn concepto_count(&self) -> usize {
        self.tables.lock().unwrap().conceptos.len()
    }

    pub fn observation_count(&self) -> usize {
        self.tables.lock().unwrap().observations.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.tables.lock().unwrap().snapshots.len()
    }

    /// Forces a budget's status, bypassing the lifecycle.
    pub fn set_status(&self, id: BudgetId, status: BudgetStatus) {
        if let Some(budget) = self.tables.lock().unwrap().budgets.get_mut(&id) {
            budget.status = status;
        }
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.faults.lock().unwrap().read_delay = Some(delay);
    }

    pub fn fail_observation_reads(&self, fail: bool) {
        self.faults.lock().unwrap().fail_observation_reads = fail;
    }

    pub fn fail_observation_writes(&self, fail: bool) {
        self.faults.lock().unwrap().fail_observation_writes = fail;
    }

    pub fn fail_snapshot_commits(&self, fail: bool) {
        self.faults.lock().unwrap().fail_snapshot_commits = fail;
    }
}

impl BudgetRepository for InMemoryStore {
    async fn insert_budget(&self, budget: Budget) -> Result<Budget, BudgetError> {
        self.tables
            .lock()
            .unwrap()
            .budgets
            .insert(budget.id, budget.clone());
        Ok(budget)
    }

    async fn find_budget(&self, id: BudgetId) -> Result<Option<Budget>, BudgetError> {
        Ok(self.tables.lock().unwrap().budgets.get(&id).cloned())
    }

    async fn find_partida(&self, id: PartidaId) -> Result<Option<Partida>, BudgetError> {
        Ok(self.tables.lock().unwrap().partidas.get(&id).cloned())
    }

    async fn find_concepto(&self, id: ConceptoId) -> Result<Option<Concepto>, BudgetError> {
        Ok(self.tables.lock().unwrap().conceptos.get(&id).cloned())
    }

    async fn load_state(&self, id: BudgetId) -> Result<Option<BudgetState>, BudgetError> {
        let tables = self.tables.lock().unwrap();
        let Some(budget) = tables.budgets.get(&id).cloned() else {
            return Ok(None);
        };
        let partidas: Vec<Partida> = tables
            .partidas
            .values()
            .filter(|p| p.budget_id == id)
            .cloned()
            .collect();
        let conceptos = tables
            .conceptos
            .values()
            .filter(|c| partidas.iter().any(|p| p.id == c.partida_id))
            .cloned()
            .collect();
        Ok(Some(BudgetState {
            budget,
            partidas,
            conceptos,
        }))
    }

    async fn apply_batch(&self, batch: BudgetBatch) -> Result<(), BudgetError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(edited) = batch.budget {
            let Some(current) = tables.budgets.get(&edited.id) else {
                return Err(BudgetError::NotFound(edited.id));
            };
            let merged = apply_budget_edit(current, edited)?;
            tables.budgets.insert(merged.id, merged);
        }
        for partida in batch.new_partidas.into_iter().chain(batch.updated_partidas) {
            tables.partidas.insert(partida.id, partida);
        }
        for concepto in batch.new_conceptos.into_iter().chain(batch.updated_conceptos) {
            tables.conceptos.insert(concepto.id, concepto);
        }
        Ok(())
    }

    async fn delete_partida_cascade(&self, id: PartidaId) -> Result<u64, BudgetError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.partidas.remove(&id).is_none() {
            return Err(BudgetError::PartidaNotFound(id));
        }
        let before = tables.conceptos.len();
        tables.conceptos.retain(|_, c| c.partida_id != id);
        Ok(u64::try_from(before - tables.conceptos.len()).unwrap())
    }

    async fn delete_concepto(&self, id: ConceptoId) -> Result<bool, BudgetError> {
        Ok(self.tables.lock().unwrap().conceptos.remove(&id).is_some())
    }
}

impl PriceObservationRepository for InMemoryStore {
    async fn insert_observation(
        &self,
        observation: PriceObservation,
    ) -> Result<PriceObservation, PricingError> {
        if self.faults.lock().unwrap().fail_observation_writes {
            return Err(PricingError::Repository("observation write failed".into()));
        }
        let mut tables = self.tables.lock().unwrap();
        let duplicate = observation.budget_id.is_some()
            && observation.version_number.is_some()
            && tables.observations.iter().any(|o| {
                o.budget_id == observation.budget_id
                    && o.version_number == observation.version_number
                    && o.cost_code == observation.cost_code
                    && o.unit == observation.unit
            });
        if duplicate {
            return Err(PricingError::Duplicate {
                cost_code: observation.cost_code,
                unit: observation.unit,
            });
        }
        tables.observations.push(observation.clone());
        Ok(observation)
    }

    async fn list_observations(
        &self,
        cost_code: &str,
        unit: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceObservation>, PricingError> {
        let (delay, fail) = {
            let faults = self.faults.lock().unwrap();
            (faults.read_delay, faults.fail_observation_reads)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(PricingError::Repository("observation read failed".into()));
        }

        let mut found: Vec<PriceObservation> = self
            .tables
            .lock()
            .unwrap()
            .observations
            .iter()
            .filter(|o| {
                o.cost_code == cost_code
                    && o.unit == unit
                    && o.observed_on >= from
                    && o.observed_on <= to
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            (b.observed_on, b.created_at).cmp(&(a.observed_on, a.created_at))
        });
        Ok(found)
    }
}

impl SnapshotRepository for InMemoryStore {
    async fn commit_publication(
        &self,
        snapshot: NewSnapshot,
    ) -> Result<BudgetSnapshot, SnapshotError> {
        if self.faults.lock().unwrap().fail_snapshot_commits {
            return Err(SnapshotError::Repository("snapshot commit failed".into()));
        }
        let mut tables = self.tables.lock().unwrap();
        let version = tables
            .snapshots
            .values()
            .filter(|s| s.budget_id == snapshot.budget_id)
            .map(|s| s.version_number)
            .max()
            .unwrap_or(0)
            + 1;

        let Some(budget) = tables.budgets.get_mut(&snapshot.budget_id) else {
            return Err(SnapshotError::BudgetNotFound(snapshot.budget_id));
        };
        if budget.status == BudgetStatus::Closed {
            return Err(SnapshotError::InvalidTransition {
                from: BudgetStatus::Closed,
                to: BudgetStatus::Published,
            });
        }
        budget.status = BudgetStatus::Published;
        budget.settings.tax = Some(snapshot.tax_settings);
        budget.updated_at = Utc::now();

        let stored = snapshot.into_snapshot(version);
        tables.snapshots.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn set_budget_status(
        &self,
        budget_id: BudgetId,
        status: BudgetStatus,
    ) -> Result<(), SnapshotError> {
        let mut tables = self.tables.lock().unwrap();
        let budget = tables
            .budgets
            .get_mut(&budget_id)
            .ok_or(SnapshotError::BudgetNotFound(budget_id))?;
        budget.status = status;
        budget.updated_at = Utc::now();
        Ok(())
    }

    async fn find_snapshot(&self, id: SnapshotId) -> Result<Option<BudgetSnapshot>, SnapshotError> {
        Ok(self.tables.lock().unwrap().snapshots.get(&id).cloned())
    }

    async fn list_snapshots(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<BudgetSnapshot>, SnapshotError> {
        let mut snapshots: Vec<BudgetSnapshot> = self
            .tables
            .lock()
            .unwrap()
            .snapshots
            .values()
            .filter(|s| s.budget_id == budget_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.version_number);
        Ok(snapshots)
    }
}

impl TemplateRepository for InMemoryStore {
    async fn insert_template(&self, template: Template) -> Result<Template, TemplateError> {
        self.tables
            .lock()
            .unwrap()
            .templates
            .insert(template.id, template.clone());
        Ok(template)
    }

    async fn find_template(&self, id: TemplateId) -> Result<Option<Template>, TemplateError> {
        Ok(self.tables.lock().unwrap().templates.get(&id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<Template>, TemplateError> {
        let mut templates: Vec<Template> =
            self.tables.lock().unwrap().templates.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn delete_template(&self, id: TemplateId) -> Result<bool, TemplateError> {
        Ok(self.tables.lock().unwrap().templates.remove(&id).is_some())
    }
}

/// Record builders with neutral values; tests override what they assert on.
pub mod fixtures {
    use chrono::{Duration, Utc};
    use obra_shared::config::TaxPolicy;
    use obra_shared::types::{
        BudgetId, ConceptoId, Currency, PartidaId, PriceObservationId, SnapshotId,
        TemplateConceptoId, TemplateId, TemplatePartidaId, UserId,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::Map;

    use crate::budget::{
        Budget, BudgetSettings, BudgetState, BudgetStatus, BudgetTotals, Concepto,
        CreateConceptoInput, CreatePartidaInput, Partida, PartidaTotal, TaxSettings,
    };
    use crate::pricing::{ObservationSource, PriceObservation};
    use crate::snapshot::BudgetSnapshot;
    use crate::template::{Template, TemplateConcepto, TemplatePartida};

    pub fn budget_state() -> BudgetState {
        let now = Utc::now();
        BudgetState {
            budget: Budget {
                id: BudgetId::new(),
                project_id: None,
                client_id: None,
                name: "Casa habitación".to_string(),
                currency: Currency::Mxn,
                status: BudgetStatus::Draft,
                settings: BudgetSettings::default(),
                created_by: UserId::new(),
                created_at: now,
                updated_at: now,
            },
            partidas: Vec::new(),
            conceptos: Vec::new(),
        }
    }

    pub fn partida(budget_id: BudgetId, name: &str, order_index: i32) -> Partida {
        let now = Utc::now();
        Partida {
            id: PartidaId::new(),
            budget_id,
            name: name.to_string(),
            order_index,
            is_active: true,
            notes: None,
            honorarios_pct_override: None,
            desperdicio_pct_override: None,
            cost_code: None,
            template_partida_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A one-unit item at zero fees and waste whose total equals `total`.
    pub fn concepto_with_total(partida_id: PartidaId, total: Decimal, is_sumable: bool) -> Concepto {
        let now = Utc::now();
        Concepto {
            id: ConceptoId::new(),
            partida_id,
            code: None,
            description: "Concreto premezclado".to_string(),
            long_description: None,
            unit: "pza".to_string(),
            provider: None,
            is_active: true,
            is_sumable,
            order_index: 0,
            properties: Map::new(),
            wbs_code: None,
            template_concepto_id: None,
            cantidad_real: Decimal::ONE,
            desperdicio_pct: Some(Decimal::ZERO),
            precio_real: total,
            honorarios_pct: Some(Decimal::ZERO),
            cantidad: Decimal::ONE,
            pu: total,
            total_real: total,
            total,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn partida_input(name: &str) -> CreatePartidaInput {
        CreatePartidaInput {
            name: name.to_string(),
            ..CreatePartidaInput::default()
        }
    }

    pub fn concepto_input(cantidad_real: Decimal, precio_real: Decimal) -> CreateConceptoInput {
        CreateConceptoInput {
            description: "Muro de block 15cm".to_string(),
            unit: "pza".to_string(),
            cantidad_real,
            precio_real,
            ..CreateConceptoInput::default()
        }
    }

    pub fn observation(cost_code: &str, unit: &str, unit_price: Decimal, days_ago: i64) -> PriceObservation {
        let created_at = Utc::now() - Duration::days(days_ago);
        PriceObservation {
            id: PriceObservationId::new(),
            cost_code: cost_code.to_string(),
            unit: unit.to_string(),
            unit_price,
            currency: Currency::Mxn,
            exchange_rate: Decimal::ONE,
            observed_on: created_at.date_naive(),
            provider: None,
            project_id: None,
            budget_id: None,
            version_number: None,
            source: ObservationSource::ExternalActual,
            created_at,
        }
    }

    /// A snapshot with the given partida subtotals, no taxes and an empty
    /// state.
    pub fn snapshot(budget_id: BudgetId, version_number: i32, partidas: Vec<PartidaTotal>) -> BudgetSnapshot {
        let subtotal: Decimal = partidas.iter().map(|p| p.subtotal).sum();
        let mut state = budget_state();
        state.budget.id = budget_id;
        BudgetSnapshot {
            id: SnapshotId::new(),
            budget_id,
            version_number,
            state,
            totals: BudgetTotals {
                subtotal,
                iva_rate: Decimal::ZERO,
                iva_amount: Decimal::ZERO,
                retenciones_rate: Decimal::ZERO,
                retenciones: Decimal::ZERO,
                grand_total: subtotal,
                partidas,
            },
            tax_settings: TaxSettings::from_policy(&TaxPolicy::default()),
            notes: None,
            created_by: UserId::new(),
            created_at: Utc::now(),
        }
    }

    /// Two partidas: "Cimentación" (CIM) with an item carrying its own fee
    /// (CIM-01) and one with zero rates (CIM-02), and "Estructura" (EST)
    /// with one item (EST-01).
    pub fn template() -> Template {
        let now = Utc::now();
        let template_id = TemplateId::new();
        let cimentacion = TemplatePartidaId::new();
        let estructura = TemplatePartidaId::new();
        let item = |partida: TemplatePartidaId, wbs: &str, unit: &str, order_index: i32| {
            TemplateConcepto {
                id: TemplateConceptoId::new(),
                template_partida_id: partida,
                code: None,
                description: format!("Partida {wbs}"),
                long_description: None,
                unit: unit.to_string(),
                wbs_code: Some(wbs.to_string()),
                cantidad: dec!(10),
                precio_real: dec!(100),
                honorarios_pct: None,
                desperdicio_pct: None,
                order_index,
            }
        };

        let mut with_fee = item(cimentacion, "CIM-01", "m3", 0);
        with_fee.honorarios_pct = Some(dec!(0.20));
        let mut zero_rates = item(cimentacion, "CIM-02", "m2", 1);
        zero_rates.honorarios_pct = Some(Decimal::ZERO);
        zero_rates.desperdicio_pct = Some(Decimal::ZERO);

        Template {
            id: template_id,
            name: "Casa tipo".to_string(),
            description: None,
            created_by: UserId::new(),
            created_at: now,
            updated_at: now,
            partidas: vec![
                TemplatePartida {
                    id: cimentacion,
                    template_id,
                    name: "Cimentación".to_string(),
                    order_index: 0,
                    cost_code: Some("CIM".to_string()),
                },
                TemplatePartida {
                    id: estructura,
                    template_id,
                    name: "Estructura".to_string(),
                    order_index: 1,
                    cost_code: Some("EST".to_string()),
                },
            ],
            conceptos: vec![with_fee, zero_rates, item(estructura, "EST-01", "kg", 0)],
        }
    }
}
