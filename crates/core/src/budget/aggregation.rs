//! Budget totals: per-partida subtotals, taxes and grand total.

use std::collections::HashMap;

use obra_shared::config::TaxPolicy;
use obra_shared::types::{PartidaId, round_storage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{BudgetSettings, BudgetState, TaxRates};

/// Subtotal of one active partida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartidaTotal {
    /// Partida ID.
    pub partida_id: PartidaId,
    /// Partida name at the time of calculation.
    pub partida_name: String,
    /// Sum of contributing concepto totals.
    pub subtotal: Decimal,
    /// Number of contributing conceptos.
    pub conceptos_count: u32,
}

/// Totals summary of a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetTotals {
    /// Sum of partida subtotals.
    pub subtotal: Decimal,
    /// IVA rate applied.
    pub iva_rate: Decimal,
    /// `subtotal × iva_rate`.
    pub iva_amount: Decimal,
    /// Withholding rate applied.
    pub retenciones_rate: Decimal,
    /// `subtotal × retenciones_rate`.
    pub retenciones: Decimal,
    /// `subtotal + iva_amount − retenciones`.
    pub grand_total: Decimal,
    /// Active partidas in display order.
    pub partidas: Vec<PartidaTotal>,
}

impl BudgetTotals {
    /// Finds the subtotal line of a partida.
    #[must_use]
    pub fn partida(&self, id: PartidaId) -> Option<&PartidaTotal> {
        self.partidas.iter().find(|p| p.partida_id == id)
    }
}

/// Subtotal of conceptos grouped under one cost-mayor code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostMayorGroup {
    /// Whitelisted cost-mayor code.
    pub cost_mayor_id: String,
    /// Sum of contributing concepto totals.
    pub subtotal: Decimal,
    /// Number of contributing conceptos.
    pub conceptos_count: u32,
}

/// Totals grouped by the budget's cost-mayor whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostMayorTotals {
    /// One group per whitelisted code, in whitelist order.
    pub groups: Vec<CostMayorGroup>,
    /// Contributing conceptos whose code matches no whitelisted prefix.
    pub unassigned_subtotal: Decimal,
    /// Number of unassigned conceptos.
    pub unassigned_count: u32,
}

/// Stateless aggregation over a loaded budget.
pub struct BudgetAggregator;

impl BudgetAggregator {
    /// Picks the tax rates to apply.
    ///
    /// Caller-supplied rates win; then the budget's stored tax settings
    /// (a disabled tax counts as zero); then the configured policy.
    #[must_use]
    pub fn resolve_rates(
        iva_rate: Option<Decimal>,
        retenciones_rate: Option<Decimal>,
        settings: &BudgetSettings,
        policy: &TaxPolicy,
    ) -> TaxRates {
        let stored = settings.tax.map(|tax| tax.effective_rates());
        TaxRates {
            iva_rate: iva_rate
                .or(stored.map(|r| r.iva_rate))
                .unwrap_or(policy.iva_rate),
            retenciones_rate: retenciones_rate
                .or(stored.map(|r| r.retenciones_rate))
                .unwrap_or(policy.retenciones_rate),
        }
    }

    /// Calculates totals for active partidas and their active, sumable
    /// conceptos. Reads only.
    #[must_use]
    pub fn calculate(state: &BudgetState, rates: TaxRates) -> BudgetTotals {
        let partidas: Vec<PartidaTotal> = state
            .ordered_partidas()
            .into_iter()
            .filter(|p| p.is_active)
            .map(|partida| {
                let (subtotal, conceptos_count) = state
                    .conceptos_of(partida.id)
                    .into_iter()
                    .filter(|c| c.contributes_to_totals())
                    .fold((Decimal::ZERO, 0u32), |(sum, count), c| {
                        (sum + c.total, count + 1)
                    });
                PartidaTotal {
                    partida_id: partida.id,
                    partida_name: partida.name.clone(),
                    subtotal,
                    conceptos_count,
                }
            })
            .collect();

        let subtotal: Decimal = partidas.iter().map(|p| p.subtotal).sum();
        let iva_amount = round_storage(subtotal * rates.iva_rate);
        let retenciones = round_storage(subtotal * rates.retenciones_rate);

        BudgetTotals {
            subtotal,
            iva_rate: rates.iva_rate,
            iva_amount,
            retenciones_rate: rates.retenciones_rate,
            retenciones,
            grand_total: subtotal + iva_amount - retenciones,
            partidas,
        }
    }

    /// Groups contributing concepto totals by the whitelisted cost-mayor
    /// codes in the budget settings.
    ///
    /// A concepto belongs to the longest whitelisted code that prefixes its
    /// WBS code (or its partida's cost code when it has none).
    #[must_use]
    pub fn group_by_cost_mayor(state: &BudgetState) -> CostMayorTotals {
        let whitelist = &state.budget.settings.cost_mayor_ids;
        let mut sums: HashMap<&str, (Decimal, u32)> = HashMap::new();
        let mut unassigned_subtotal = Decimal::ZERO;
        let mut unassigned_count = 0u32;

        for partida in state.partidas.iter().filter(|p| p.is_active) {
            for concepto in state
                .conceptos_of(partida.id)
                .into_iter()
                .filter(|c| c.contributes_to_totals())
            {
                let code = concepto
                    .wbs_code
                    .as_deref()
                    .or(partida.cost_code.as_deref());
                match code.and_then(|code| Self::match_cost_mayor(whitelist, code)) {
                    Some(id) => {
                        let entry = sums.entry(id).or_insert((Decimal::ZERO, 0));
                        entry.0 += concepto.total;
                        entry.1 += 1;
                    }
                    None => {
                        unassigned_subtotal += concepto.total;
                        unassigned_count += 1;
                    }
                }
            }
        }

        let groups = whitelist
            .iter()
            .map(|id| {
                let (subtotal, conceptos_count) =
                    sums.get(id.as_str()).copied().unwrap_or((Decimal::ZERO, 0));
                CostMayorGroup {
                    cost_mayor_id: id.clone(),
                    subtotal,
                    conceptos_count,
                }
            })
            .collect();

        CostMayorTotals {
            groups,
            unassigned_subtotal,
            unassigned_count,
        }
    }

    fn match_cost_mayor<'a>(whitelist: &'a [String], code: &str) -> Option<&'a str> {
        let code = code.trim();
        whitelist
            .iter()
            .map(String::as_str)
            .filter(|id| code.starts_with(id.trim()))
            .max_by_key(|id| id.trim().len())
    }
}
