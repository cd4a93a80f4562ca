//! Budget data types.

use chrono::{DateTime, Utc};
use obra_shared::config::TaxPolicy;
use obra_shared::types::{
    BudgetId, ClientId, ConceptoId, Currency, PartidaId, ProjectId, TemplateConceptoId,
    TemplatePartidaId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle status of a budget.
///
/// Valid transitions:
/// - Draft → Published (first publish)
/// - Published → Published (re-publish, next version)
/// - Published → Closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    /// Being prepared; fully editable.
    #[default]
    Draft,
    /// At least one snapshot exists; tax settings are read-only.
    Published,
    /// Terminal; no further edits or snapshots.
    Closed,
}

impl BudgetStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Closed => "closed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns true if partidas and conceptos may still be edited.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Published)
    }

    /// Returns true if tax settings may still be changed.
    #[must_use]
    pub const fn tax_settings_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tax toggles and rates stored on a budget and frozen into snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSettings {
    /// Whether IVA is charged.
    pub iva_enabled: bool,
    /// IVA rate as a fraction.
    pub iva_rate: Decimal,
    /// Whether withholdings are applied.
    pub retenciones_enabled: bool,
    /// Withholding rate as a fraction.
    pub retenciones_rate: Decimal,
}

impl TaxSettings {
    /// Builds settings from the configured policy.
    #[must_use]
    pub fn from_policy(policy: &TaxPolicy) -> Self {
        Self {
            iva_enabled: true,
            iva_rate: policy.iva_rate,
            retenciones_enabled: !policy.retenciones_rate.is_zero(),
            retenciones_rate: policy.retenciones_rate,
        }
    }

    /// Rates actually applied: a disabled tax contributes zero.
    #[must_use]
    pub fn effective_rates(&self) -> TaxRates {
        TaxRates {
            iva_rate: if self.iva_enabled {
                self.iva_rate
            } else {
                Decimal::ZERO
            },
            retenciones_rate: if self.retenciones_enabled {
                self.retenciones_rate
            } else {
                Decimal::ZERO
            },
        }
    }
}

/// Tax rates applied by aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRates {
    /// IVA rate as a fraction.
    pub iva_rate: Decimal,
    /// Withholding rate as a fraction.
    pub retenciones_rate: Decimal,
}

/// Budget-level settings.
///
/// Unknown keys are preserved in `extra` so that collaborators can keep
/// their own metadata next to the engine's.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetSettings {
    /// Default fee fraction for partidas without an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub honorarios_pct_default: Option<Decimal>,
    /// Default waste fraction for partidas without an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desperdicio_pct_default: Option<Decimal>,
    /// Tax settings; `None` until set or frozen by the first publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<TaxSettings>,
    /// Whitelisted cost-mayor codes used for grouping totals.
    #[serde(default)]
    pub cost_mayor_ids: Vec<String>,
    /// Free-form extension keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A budget record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Budget ID.
    pub id: BudgetId,
    /// Optional project reference.
    pub project_id: Option<ProjectId>,
    /// Optional client reference.
    pub client_id: Option<ClientId>,
    /// Budget name.
    pub name: String,
    /// Currency of all amounts in this budget.
    pub currency: Currency,
    /// Lifecycle status.
    pub status: BudgetStatus,
    /// Defaults, tax settings and grouping whitelist.
    pub settings: BudgetSettings,
    /// User who created the budget.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A cost chapter grouping conceptos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partida {
    /// Partida ID.
    pub id: PartidaId,
    /// Parent budget ID.
    pub budget_id: BudgetId,
    /// Display name.
    pub name: String,
    /// Position within the budget.
    pub order_index: i32,
    /// Inactive partidas are excluded from totals.
    pub is_active: bool,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Fee override; `None` unless explicitly set.
    pub honorarios_pct_override: Option<Decimal>,
    /// Waste override; `None` unless explicitly set.
    pub desperdicio_pct_override: Option<Decimal>,
    /// Cost-mayor code from the cost catalog.
    pub cost_code: Option<String>,
    /// Template partida this record was created from.
    pub template_partida_id: Option<TemplatePartidaId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A priced line item.
///
/// `cantidad`, `pu`, `total_real` and `total` are derived from the inputs and
/// are never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concepto {
    /// Concepto ID.
    pub id: ConceptoId,
    /// Parent partida ID.
    pub partida_id: PartidaId,
    /// Optional item code.
    pub code: Option<String>,
    /// Short description.
    pub description: String,
    /// Long description.
    pub long_description: Option<String>,
    /// Unit of measure.
    pub unit: String,
    /// Optional provider.
    pub provider: Option<String>,
    /// Inactive items are excluded from totals.
    pub is_active: bool,
    /// Non-sumable items are displayed but excluded from totals.
    pub is_sumable: bool,
    /// Position within the partida.
    pub order_index: i32,
    /// Extension metadata.
    pub properties: Map<String, Value>,
    /// WBS / cost code joining to actuals and price observations.
    pub wbs_code: Option<String>,
    /// Template concepto this record was created from.
    pub template_concepto_id: Option<TemplateConceptoId>,
    /// Measured quantity.
    pub cantidad_real: Decimal,
    /// Waste fraction; `None` means "use the resolved default".
    pub desperdicio_pct: Option<Decimal>,
    /// Unit cost before fees.
    pub precio_real: Decimal,
    /// Fee fraction; `None` means "use the resolved default".
    pub honorarios_pct: Option<Decimal>,
    /// Quantity including waste.
    pub cantidad: Decimal,
    /// Unit price including fees.
    pub pu: Decimal,
    /// `precio_real × cantidad_real`.
    pub total_real: Decimal,
    /// `pu × cantidad`.
    pub total: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Concepto {
    /// Returns true if this item contributes to aggregates.
    #[must_use]
    pub const fn contributes_to_totals(&self) -> bool {
        self.is_active && self.is_sumable
    }
}

/// Full state of a budget: the unit loaded for aggregation and frozen into
/// snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetState {
    /// Budget record.
    pub budget: Budget,
    /// All partidas, active or not.
    pub partidas: Vec<Partida>,
    /// All conceptos of all partidas.
    pub conceptos: Vec<Concepto>,
}

impl BudgetState {
    /// Finds a partida by ID.
    #[must_use]
    pub fn partida(&self, id: PartidaId) -> Option<&Partida> {
        self.partidas.iter().find(|p| p.id == id)
    }

    /// Finds a concepto by ID.
    #[must_use]
    pub fn concepto(&self, id: ConceptoId) -> Option<&Concepto> {
        self.conceptos.iter().find(|c| c.id == id)
    }

    /// Conceptos of one partida, in display order.
    #[must_use]
    pub fn conceptos_of(&self, partida_id: PartidaId) -> Vec<&Concepto> {
        let mut items: Vec<&Concepto> = self
            .conceptos
            .iter()
            .filter(|c| c.partida_id == partida_id)
            .collect();
        items.sort_by_key(|c| (c.order_index, c.id));
        items
    }

    /// Partidas in display order.
    #[must_use]
    pub fn ordered_partidas(&self) -> Vec<&Partida> {
        let mut partidas: Vec<&Partida> = self.partidas.iter().collect();
        partidas.sort_by_key(|p| (p.order_index, p.id));
        partidas
    }
}

/// Input for creating a new budget.
#[derive(Debug, Clone)]
pub struct CreateBudgetInput {
    /// Optional project reference.
    pub project_id: Option<ProjectId>,
    /// Optional client reference.
    pub client_id: Option<ClientId>,
    /// Budget name.
    pub name: String,
    /// Currency code.
    pub currency: Currency,
    /// Initial settings.
    pub settings: BudgetSettings,
    /// User creating the budget.
    pub created_by: UserId,
}

/// Input for updating a budget.
#[derive(Debug, Clone, Default)]
pub struct UpdateBudgetInput {
    /// New name.
    pub name: Option<String>,
    /// Replacement settings.
    pub settings: Option<BudgetSettings>,
}

/// Input for creating a partida.
#[derive(Debug, Clone, Default)]
pub struct CreatePartidaInput {
    /// Display name.
    pub name: String,
    /// Position; appended at the end when omitted.
    pub order_index: Option<i32>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Fee override.
    pub honorarios_pct_override: Option<Decimal>,
    /// Waste override.
    pub desperdicio_pct_override: Option<Decimal>,
    /// Cost-mayor code.
    pub cost_code: Option<String>,
}

/// Input for updating a partida.
#[derive(Debug, Clone, Default)]
pub struct UpdatePartidaInput {
    /// New name.
    pub name: Option<String>,
    /// New position.
    pub order_index: Option<i32>,
    /// New active flag.
    pub is_active: Option<bool>,
    /// New notes.
    pub notes: Option<Option<String>>,
    /// New fee override (`Some(None)` clears it).
    pub honorarios_pct_override: Option<Option<Decimal>>,
    /// New waste override (`Some(None)` clears it).
    pub desperdicio_pct_override: Option<Option<Decimal>>,
    /// New cost-mayor code.
    pub cost_code: Option<Option<String>>,
}

/// Input for creating a concepto.
#[derive(Debug, Clone)]
pub struct CreateConceptoInput {
    /// Optional item code.
    pub code: Option<String>,
    /// Short description.
    pub description: String,
    /// Long description.
    pub long_description: Option<String>,
    /// Unit of measure.
    pub unit: String,
    /// Optional provider.
    pub provider: Option<String>,
    /// WBS / cost code.
    pub wbs_code: Option<String>,
    /// Measured quantity.
    pub cantidad_real: Decimal,
    /// Unit cost before fees.
    pub precio_real: Decimal,
    /// Explicit fee fraction.
    pub honorarios_pct: Option<Decimal>,
    /// Explicit waste fraction.
    pub desperdicio_pct: Option<Decimal>,
    /// Whether the item counts toward totals.
    pub is_sumable: bool,
    /// Position; appended at the end when omitted.
    pub order_index: Option<i32>,
    /// Extension metadata.
    pub properties: Map<String, Value>,
}

impl Default for CreateConceptoInput {
    fn default() -> Self {
        Self {
            code: None,
            description: String::new(),
            long_description: None,
            unit: String::new(),
            provider: None,
            wbs_code: None,
            cantidad_real: Decimal::ZERO,
            precio_real: Decimal::ZERO,
            honorarios_pct: None,
            desperdicio_pct: None,
            is_sumable: true,
            order_index: None,
            properties: Map::new(),
        }
    }
}

/// Input for updating a concepto. Derived fields are not editable.
#[derive(Debug, Clone, Default)]
pub struct UpdateConceptoInput {
    /// New code.
    pub code: Option<Option<String>>,
    /// New short description.
    pub description: Option<String>,
    /// New long description.
    pub long_description: Option<Option<String>>,
    /// New unit.
    pub unit: Option<String>,
    /// New provider.
    pub provider: Option<Option<String>>,
    /// New WBS code.
    pub wbs_code: Option<Option<String>>,
    /// New measured quantity.
    pub cantidad_real: Option<Decimal>,
    /// New unit cost.
    pub precio_real: Option<Decimal>,
    /// New fee fraction (`Some(None)` reverts to the resolved default).
    pub honorarios_pct: Option<Option<Decimal>>,
    /// New waste fraction (`Some(None)` reverts to the resolved default).
    pub desperdicio_pct: Option<Option<Decimal>>,
    /// New active flag.
    pub is_active: Option<bool>,
    /// New sumable flag.
    pub is_sumable: Option<bool>,
    /// New position.
    pub order_index: Option<i32>,
    /// Replacement properties.
    pub properties: Option<Map<String, Value>>,
}

/// Records written together in one repository transaction.
#[derive(Debug, Clone, Default)]
pub struct BudgetBatch {
    /// Budget edit. Only its editable fields are written, merged onto the
    /// stored row with [`apply_budget_edit`](super::service::apply_budget_edit).
    pub budget: Option<Budget>,
    /// Partidas to insert.
    pub new_partidas: Vec<Partida>,
    /// Partidas to overwrite.
    pub updated_partidas: Vec<Partida>,
    /// Conceptos to insert.
    pub new_conceptos: Vec<Concepto>,
    /// Conceptos to overwrite.
    pub updated_conceptos: Vec<Concepto>,
}

impl BudgetBatch {
    /// Returns true if the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.budget.is_none()
            && self.new_partidas.is_empty()
            && self.updated_partidas.is_empty()
            && self.new_conceptos.is_empty()
            && self.updated_conceptos.is_empty()
    }
}
