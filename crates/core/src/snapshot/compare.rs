//! Structural comparison of two snapshots.
//!
//! Partidas and conceptos are keyed by id only. A renamed partida is the
//! same partida; two partidas with the same name are different ones.

use std::collections::{BTreeSet, HashMap};

use obra_shared::types::{ConceptoId, PartidaId, round_display, safe_div};
use rust_decimal::Decimal;

use super::error::SnapshotError;
use super::types::{
    BudgetSnapshot, ChangeCounts, ChangeKind, ConceptoChange, PartidaChange, SnapshotComparison,
};
use crate::budget::{Concepto, PartidaTotal};

/// Stateless snapshot comparison.
pub struct SnapshotComparer;

impl SnapshotComparer {
    /// Compares two snapshots of the same budget, in either argument order.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::BudgetMismatch` if they belong to different
    /// budgets.
    pub fn compare(
        a: &BudgetSnapshot,
        b: &BudgetSnapshot,
    ) -> Result<SnapshotComparison, SnapshotError> {
        if a.budget_id != b.budget_id {
            return Err(SnapshotError::BudgetMismatch(a.budget_id, b.budget_id));
        }
        let (older, newer) = if a.version_number <= b.version_number {
            (a, b)
        } else {
            (b, a)
        };

        let (partida_changes, partida_counts) = Self::partida_changes(
            &older.totals.partidas,
            &newer.totals.partidas,
        );
        let (concepto_changes, concepto_counts) =
            Self::concepto_changes(&older.state.conceptos, &newer.state.conceptos);

        let delta_grand_total = newer.totals.grand_total - older.totals.grand_total;
        let delta_percentage = round_display(
            safe_div(delta_grand_total, older.totals.grand_total) * Decimal::ONE_HUNDRED,
        );

        Ok(SnapshotComparison {
            budget_id: older.budget_id,
            older_snapshot_id: older.id,
            newer_snapshot_id: newer.id,
            older_version: older.version_number,
            newer_version: newer.version_number,
            older_grand_total: older.totals.grand_total,
            newer_grand_total: newer.totals.grand_total,
            delta_grand_total,
            delta_percentage,
            partida_changes,
            concepto_changes,
            partida_counts,
            concepto_counts,
        })
    }

    fn partida_changes(
        older: &[PartidaTotal],
        newer: &[PartidaTotal],
    ) -> (Vec<PartidaChange>, ChangeCounts) {
        let older_by_id: HashMap<PartidaId, &PartidaTotal> =
            older.iter().map(|p| (p.partida_id, p)).collect();
        let newer_by_id: HashMap<PartidaId, &PartidaTotal> =
            newer.iter().map(|p| (p.partida_id, p)).collect();
        let ids: BTreeSet<PartidaId> = older_by_id.keys().chain(newer_by_id.keys()).copied().collect();

        let mut counts = ChangeCounts::default();
        let mut changes: Vec<PartidaChange> = ids
            .into_iter()
            .filter_map(|id| {
                let before = older_by_id.get(&id);
                let after = newer_by_id.get(&id);
                let (kind, name) = match (before, after) {
                    (None, Some(n)) => (ChangeKind::Added, &n.partida_name),
                    (Some(o), None) => (ChangeKind::Removed, &o.partida_name),
                    (Some(o), Some(n)) if o.subtotal != n.subtotal => {
                        (ChangeKind::Modified, &n.partida_name)
                    }
                    (Some(_), Some(n)) => (ChangeKind::Unchanged, &n.partida_name),
                    (None, None) => return None,
                };
                counts.record(kind);

                let older_subtotal = before.map_or(Decimal::ZERO, |p| p.subtotal);
                let newer_subtotal = after.map_or(Decimal::ZERO, |p| p.subtotal);
                Some(PartidaChange {
                    partida_id: id,
                    partida_name: name.clone(),
                    kind,
                    older_subtotal,
                    newer_subtotal,
                    delta: newer_subtotal - older_subtotal,
                })
            })
            .collect();

        changes.sort_by(|x, y| {
            y.delta
                .abs()
                .cmp(&x.delta.abs())
                .then_with(|| x.partida_id.cmp(&y.partida_id))
        });
        (changes, counts)
    }

    fn concepto_changes(
        older: &[Concepto],
        newer: &[Concepto],
    ) -> (Vec<ConceptoChange>, ChangeCounts) {
        let older_by_id: HashMap<ConceptoId, &Concepto> = older.iter().map(|c| (c.id, c)).collect();
        let newer_by_id: HashMap<ConceptoId, &Concepto> = newer.iter().map(|c| (c.id, c)).collect();
        let ids: BTreeSet<ConceptoId> = older_by_id.keys().chain(newer_by_id.keys()).copied().collect();

        let mut counts = ChangeCounts::default();
        let mut changes = Vec::new();
        for id in ids {
            let change = match (older_by_id.get(&id), newer_by_id.get(&id)) {
                (None, Some(n)) => ConceptoChange {
                    concepto_id: id,
                    partida_id: n.partida_id,
                    description: n.description.clone(),
                    kind: ChangeKind::Added,
                    changed_fields: Vec::new(),
                    older_total: None,
                    newer_total: Some(n.total),
                },
                (Some(o), None) => ConceptoChange {
                    concepto_id: id,
                    partida_id: o.partida_id,
                    description: o.description.clone(),
                    kind: ChangeKind::Removed,
                    changed_fields: Vec::new(),
                    older_total: Some(o.total),
                    newer_total: None,
                },
                (Some(o), Some(n)) => {
                    let changed_fields = Self::changed_fields(o, n);
                    if changed_fields.is_empty() {
                        counts.record(ChangeKind::Unchanged);
                        continue;
                    }
                    ConceptoChange {
                        concepto_id: id,
                        partida_id: n.partida_id,
                        description: n.description.clone(),
                        kind: ChangeKind::Modified,
                        changed_fields,
                        older_total: Some(o.total),
                        newer_total: Some(n.total),
                    }
                }
                (None, None) => continue,
            };
            counts.record(change.kind);
            changes.push(change);
        }
        (changes, counts)
    }

    /// Names of the user-visible fields that differ between two versions of
    /// a concepto.
    fn changed_fields(older: &Concepto, newer: &Concepto) -> Vec<String> {
        let checks: [(&str, bool); 17] = [
            ("partida_id", older.partida_id != newer.partida_id),
            ("code", older.code != newer.code),
            ("description", older.description != newer.description),
            ("long_description", older.long_description != newer.long_description),
            ("unit", older.unit != newer.unit),
            ("provider", older.provider != newer.provider),
            ("is_active", older.is_active != newer.is_active),
            ("is_sumable", older.is_sumable != newer.is_sumable),
            ("wbs_code", older.wbs_code != newer.wbs_code),
            ("cantidad_real", older.cantidad_real != newer.cantidad_real),
            ("desperdicio_pct", older.desperdicio_pct != newer.desperdicio_pct),
            ("precio_real", older.precio_real != newer.precio_real),
            ("honorarios_pct", older.honorarios_pct != newer.honorarios_pct),
            ("cantidad", older.cantidad != newer.cantidad),
            ("pu", older.pu != newer.pu),
            ("total_real", older.total_real != newer.total_real),
            ("total", older.total != newer.total),
        ];
        checks
            .into_iter()
            .filter(|(_, differs)| *differs)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}
