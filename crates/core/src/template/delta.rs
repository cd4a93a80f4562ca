//! Template delta: what a budget is missing relative to a template.
//!
//! A template record matches a budget record when the budget record carries
//! its provenance id (written by an earlier merge) or when both resolve to
//! the same catalog code. Names are never compared. Conceptos are matched by
//! code only within their target partida. Template conceptos that share a
//! code are each added; they are distinct records with their own provenance.

use obra_shared::config::DefaultRates;
use obra_shared::types::PartidaId;
use rust_decimal::Decimal;

use super::catalog::CostCatalog;
use super::types::{
    ConceptoFill, ConceptoToAdd, PartidaTarget, PartidaToAdd, Template, TemplateConcepto,
    TemplateDelta, TemplatePartida, UnmappedItem,
};
use crate::budget::{BudgetState, Concepto, DefaultsResolver, Partida, PartidaOverrides};

/// Computes the delta between a template and a loaded budget.
#[must_use]
pub fn calculate_delta(
    template: &Template,
    state: &BudgetState,
    catalog: &dyn CostCatalog,
    fallback: &DefaultRates,
) -> TemplateDelta {
    let mut delta = TemplateDelta::default();

    let mut template_partidas: Vec<&TemplatePartida> = template.partidas.iter().collect();
    template_partidas.sort_by_key(|p| (p.order_index, p.id));

    for template_partida in template_partidas {
        let partida_code = resolve(catalog, template_partida.cost_code.as_deref());
        let existing = find_partida(state, template_partida, partida_code.as_deref(), catalog);

        let (target, partida_name, overrides) = match existing {
            Some(partida) => (
                PartidaTarget::Existing(partida.id),
                partida.name.clone(),
                PartidaOverrides::from(partida),
            ),
            None => {
                if partida_code.is_none() {
                    delta.unmapped.push(UnmappedItem::Partida {
                        template_partida_id: template_partida.id,
                        name: template_partida.name.clone(),
                    });
                }
                delta.partidas_to_add.push(PartidaToAdd {
                    template_partida_id: template_partida.id,
                    name: template_partida.name.clone(),
                    order_index: template_partida.order_index,
                    cost_code: partida_code.or_else(|| template_partida.cost_code.clone()),
                });
                (
                    PartidaTarget::New(template_partida.id),
                    template_partida.name.clone(),
                    PartidaOverrides::default(),
                )
            }
        };
        let inherited = DefaultsResolver::resolve(&state.budget.settings, overrides, fallback);

        for template_concepto in template.conceptos_of(template_partida.id) {
            let code = concepto_code(catalog, template_concepto);
            let existing_id = match target {
                PartidaTarget::Existing(id) => Some(id),
                PartidaTarget::New(_) => None,
            };

            if let Some(concepto) =
                find_concepto(state, existing_id, template_concepto, code.as_deref(), catalog)
            {
                if let Some(fill) = fill_for(concepto, template_concepto) {
                    delta.existing_conceptos_to_update.push(fill);
                }
                continue;
            }

            if code.is_none() {
                delta.unmapped.push(UnmappedItem::Concepto {
                    template_concepto_id: template_concepto.id,
                    partida_name: partida_name.clone(),
                    description: template_concepto.description.clone(),
                });
            }

            delta.conceptos_to_add.push(ConceptoToAdd {
                partida_name: partida_name.clone(),
                target,
                template_concepto_id: template_concepto.id,
                code: template_concepto.code.clone(),
                description: template_concepto.description.clone(),
                long_description: template_concepto.long_description.clone(),
                unit: template_concepto.unit.clone(),
                wbs_code: template_concepto.wbs_code.clone(),
                cantidad_real: Decimal::ZERO,
                precio_real: template_concepto.precio_real,
                honorarios_pct: non_zero(template_concepto.honorarios_pct)
                    .unwrap_or(inherited.honorarios_pct),
                desperdicio_pct: non_zero(template_concepto.desperdicio_pct)
                    .unwrap_or(inherited.desperdicio_pct),
                order_index: template_concepto.order_index,
            });
        }
    }

    delta
}

fn non_zero(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| !v.is_zero())
}

fn resolve(catalog: &dyn CostCatalog, code: Option<&str>) -> Option<String> {
    code.and_then(|c| catalog.resolve(c))
}

fn concepto_code(catalog: &dyn CostCatalog, concepto: &TemplateConcepto) -> Option<String> {
    resolve(catalog, concepto.wbs_code.as_deref()).or_else(|| resolve(catalog, concepto.code.as_deref()))
}

fn find_partida<'a>(
    state: &'a BudgetState,
    template_partida: &TemplatePartida,
    code: Option<&str>,
    catalog: &dyn CostCatalog,
) -> Option<&'a Partida> {
    state
        .partidas
        .iter()
        .find(|p| p.template_partida_id == Some(template_partida.id))
        .or_else(|| {
            let code = code?;
            state
                .ordered_partidas()
                .into_iter()
                .find(|p| resolve(catalog, p.cost_code.as_deref()).as_deref() == Some(code))
        })
}

fn find_concepto<'a>(
    state: &'a BudgetState,
    partida_id: Option<PartidaId>,
    template_concepto: &TemplateConcepto,
    code: Option<&str>,
    catalog: &dyn CostCatalog,
) -> Option<&'a Concepto> {
    state
        .conceptos
        .iter()
        .find(|c| c.template_concepto_id == Some(template_concepto.id))
        .or_else(|| {
            let code = code?;
            let partida_id = partida_id?;
            state.conceptos_of(partida_id).into_iter().find(|c| {
                let existing = resolve(catalog, c.wbs_code.as_deref())
                    .or_else(|| resolve(catalog, c.code.as_deref()));
                existing.as_deref() == Some(code)
            })
        })
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn fill_for(existing: &Concepto, template: &TemplateConcepto) -> Option<ConceptoFill> {
    let wbs_code = template
        .wbs_code
        .clone()
        .filter(|v| !v.trim().is_empty() && is_blank(existing.wbs_code.as_deref()));
    let unit = Some(template.unit.clone())
        .filter(|v| !v.trim().is_empty() && existing.unit.trim().is_empty());
    let long_description = template
        .long_description
        .clone()
        .filter(|v| !v.trim().is_empty() && is_blank(existing.long_description.as_deref()));

    if wbs_code.is_none() && unit.is_none() && long_description.is_none() {
        return None;
    }
    Some(ConceptoFill {
        concepto_id: existing.id,
        template_concepto_id: template.id,
        wbs_code,
        unit,
        long_description,
    })
}
