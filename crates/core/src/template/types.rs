//! Template and merge types.

use chrono::{DateTime, Utc};
use obra_shared::types::{
    ConceptoId, PartidaId, TemplateConceptoId, TemplateId, TemplatePartidaId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A reusable skeleton of partidas and line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template ID.
    pub id: TemplateId,
    /// Template name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Author.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Partidas in display order.
    pub partidas: Vec<TemplatePartida>,
    /// Line items of all partidas.
    pub conceptos: Vec<TemplateConcepto>,
}

impl Template {
    /// Line items of one template partida, in display order.
    #[must_use]
    pub fn conceptos_of(&self, partida_id: TemplatePartidaId) -> Vec<&TemplateConcepto> {
        let mut items: Vec<&TemplateConcepto> = self
            .conceptos
            .iter()
            .filter(|c| c.template_partida_id == partida_id)
            .collect();
        items.sort_by_key(|c| (c.order_index, c.id));
        items
    }
}

/// A partida of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePartida {
    /// Template partida ID.
    pub id: TemplatePartidaId,
    /// Owning template.
    pub template_id: TemplateId,
    /// Display name.
    pub name: String,
    /// Position within the template.
    pub order_index: i32,
    /// Cost-mayor code used to match existing partidas.
    pub cost_code: Option<String>,
}

/// A line item of a template partida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConcepto {
    /// Template concepto ID.
    pub id: TemplateConceptoId,
    /// Owning template partida.
    pub template_partida_id: TemplatePartidaId,
    /// Optional item code.
    pub code: Option<String>,
    /// Short description.
    pub description: String,
    /// Long description.
    pub long_description: Option<String>,
    /// Unit of measure.
    pub unit: String,
    /// WBS / cost code used to match existing conceptos.
    pub wbs_code: Option<String>,
    /// Reference quantity; not copied into budgets.
    pub cantidad: Decimal,
    /// Default unit cost.
    pub precio_real: Decimal,
    /// Fee fraction; zero or absent means "use the budget's default".
    pub honorarios_pct: Option<Decimal>,
    /// Waste fraction; zero or absent means "use the budget's default".
    pub desperdicio_pct: Option<Decimal>,
    /// Position within the partida.
    pub order_index: i32,
}

/// Input for creating a template with its content.
#[derive(Debug, Clone)]
pub struct CreateTemplateInput {
    /// Template name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Author.
    pub created_by: UserId,
    /// Partidas with their line items.
    pub partidas: Vec<CreateTemplatePartidaInput>,
}

/// Input for one template partida.
#[derive(Debug, Clone, Default)]
pub struct CreateTemplatePartidaInput {
    /// Display name.
    pub name: String,
    /// Cost-mayor code.
    pub cost_code: Option<String>,
    /// Line items.
    pub conceptos: Vec<CreateTemplateConceptoInput>,
}

/// Input for one template line item.
#[derive(Debug, Clone, Default)]
pub struct CreateTemplateConceptoInput {
    /// Optional item code.
    pub code: Option<String>,
    /// Short description.
    pub description: String,
    /// Long description.
    pub long_description: Option<String>,
    /// Unit of measure.
    pub unit: String,
    /// WBS / cost code.
    pub wbs_code: Option<String>,
    /// Reference quantity.
    pub cantidad: Decimal,
    /// Default unit cost.
    pub precio_real: Decimal,
    /// Fee fraction.
    pub honorarios_pct: Option<Decimal>,
    /// Waste fraction.
    pub desperdicio_pct: Option<Decimal>,
}

/// Partida a new concepto will be created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum PartidaTarget {
    /// A partida that already exists in the budget.
    Existing(PartidaId),
    /// A partida created by the same merge from this template partida.
    New(TemplatePartidaId),
}

/// A template partida missing from the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartidaToAdd {
    /// Source template partida.
    pub template_partida_id: TemplatePartidaId,
    /// Display name.
    pub name: String,
    /// Position within the template.
    pub order_index: i32,
    /// Cost-mayor code, canonical if recognised.
    pub cost_code: Option<String>,
}

/// A template line item missing from the budget, with resolved values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptoToAdd {
    /// Name of the partida it goes into.
    pub partida_name: String,
    /// Partida it goes into.
    pub target: PartidaTarget,
    /// Source template concepto.
    pub template_concepto_id: TemplateConceptoId,
    /// Optional item code.
    pub code: Option<String>,
    /// Short description.
    pub description: String,
    /// Long description.
    pub long_description: Option<String>,
    /// Unit of measure.
    pub unit: String,
    /// WBS / cost code.
    pub wbs_code: Option<String>,
    /// Always zero so a merge never inflates totals.
    pub cantidad_real: Decimal,
    /// Unit cost from the template.
    pub precio_real: Decimal,
    /// Explicit fee fraction.
    pub honorarios_pct: Decimal,
    /// Explicit waste fraction.
    pub desperdicio_pct: Decimal,
    /// Position within the template partida.
    pub order_index: i32,
}

/// Fill-only update of a matched concepto: each field is `Some` only when
/// the existing value is empty and the template has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptoFill {
    /// Concepto to update.
    pub concepto_id: ConceptoId,
    /// Template concepto it matched.
    pub template_concepto_id: TemplateConceptoId,
    /// WBS code to fill.
    pub wbs_code: Option<String>,
    /// Unit to fill.
    pub unit: Option<String>,
    /// Long description to fill.
    pub long_description: Option<String>,
}

/// A template record created without a recognised cost code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum UnmappedItem {
    /// An unmapped partida.
    Partida {
        /// Source template partida.
        template_partida_id: TemplatePartidaId,
        /// Display name.
        name: String,
    },
    /// An unmapped line item.
    Concepto {
        /// Source template concepto.
        template_concepto_id: TemplateConceptoId,
        /// Partida it goes into.
        partida_name: String,
        /// Short description.
        description: String,
    },
}

/// Structural additions needed to bring a budget up to a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDelta {
    /// Partidas to create.
    pub partidas_to_add: Vec<PartidaToAdd>,
    /// Line items to create.
    pub conceptos_to_add: Vec<ConceptoToAdd>,
    /// Fill-only updates of matched line items.
    pub existing_conceptos_to_update: Vec<ConceptoFill>,
    /// Additions without a recognised cost code.
    pub unmapped: Vec<UnmappedItem>,
}

impl TemplateDelta {
    /// Returns true if applying the delta would write nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partidas_to_add.is_empty()
            && self.conceptos_to_add.is_empty()
            && self.existing_conceptos_to_update.is_empty()
    }
}

/// Outcome of applying a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Partidas created.
    pub partidas_created: Vec<PartidaId>,
    /// Conceptos created.
    pub conceptos_created: Vec<ConceptoId>,
    /// Conceptos filled in.
    pub conceptos_updated: Vec<ConceptoId>,
    /// Created records without a recognised cost code.
    pub unmapped: Vec<UnmappedItem>,
}
