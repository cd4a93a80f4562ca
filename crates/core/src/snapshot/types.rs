//! Snapshot and comparison types.

use chrono::{DateTime, Utc};
use obra_shared::types::{BudgetId, ConceptoId, PartidaId, SnapshotId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::budget::{BudgetState, BudgetTotals, TaxSettings};

/// An immutable, versioned capture of a budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    /// Snapshot ID.
    pub id: SnapshotId,
    /// Budget the snapshot belongs to.
    pub budget_id: BudgetId,
    /// Version number, 1-based and contiguous per budget.
    pub version_number: i32,
    /// Frozen copy of the budget, its partidas and conceptos.
    pub state: BudgetState,
    /// Totals computed at capture time.
    pub totals: BudgetTotals,
    /// Tax settings used for the totals.
    pub tax_settings: TaxSettings,
    /// Optional publication notes.
    pub notes: Option<String>,
    /// User who published.
    pub created_by: UserId,
    /// Capture timestamp.
    pub created_at: DateTime<Utc>,
}

/// A snapshot waiting for its version number.
///
/// The repository assigns `max(version) + 1` inside the same transaction
/// that stores the snapshot and marks the budget published.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    /// Snapshot ID.
    pub id: SnapshotId,
    /// Budget the snapshot belongs to.
    pub budget_id: BudgetId,
    /// Frozen copy of the budget.
    pub state: BudgetState,
    /// Totals computed at capture time.
    pub totals: BudgetTotals,
    /// Tax settings used for the totals; stored on the budget as well.
    pub tax_settings: TaxSettings,
    /// Optional publication notes.
    pub notes: Option<String>,
    /// User who published.
    pub created_by: UserId,
    /// Capture timestamp.
    pub created_at: DateTime<Utc>,
}

impl NewSnapshot {
    /// Attaches the assigned version number.
    #[must_use]
    pub fn into_snapshot(self, version_number: i32) -> BudgetSnapshot {
        BudgetSnapshot {
            id: self.id,
            budget_id: self.budget_id,
            version_number,
            state: self.state,
            totals: self.totals,
            tax_settings: self.tax_settings,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// Input for publishing a budget.
#[derive(Debug, Clone)]
pub struct PublishInput {
    /// Tax settings to use; the stored ones (or policy) when omitted.
    pub tax_settings: Option<TaxSettings>,
    /// Optional publication notes.
    pub notes: Option<String>,
    /// User publishing.
    pub published_by: UserId,
}

/// Result of a publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    /// The new snapshot.
    pub snapshot: BudgetSnapshot,
    /// Observations stored.
    pub observations_recorded: u32,
    /// Observations that already existed.
    pub observations_duplicate: u32,
    /// Observations that failed and were skipped.
    pub observations_failed: u32,
}

/// Classification of a record between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present only in the newer snapshot.
    Added,
    /// Present only in the older snapshot.
    Removed,
    /// Present in both with differences.
    Modified,
    /// Present in both without differences.
    Unchanged,
}

/// Subtotal change of one partida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartidaChange {
    /// Partida ID.
    pub partida_id: PartidaId,
    /// Name in the newer snapshot, or the older one if removed.
    pub partida_name: String,
    /// Classification.
    pub kind: ChangeKind,
    /// Subtotal in the older snapshot (0 if absent).
    pub older_subtotal: Decimal,
    /// Subtotal in the newer snapshot (0 if absent).
    pub newer_subtotal: Decimal,
    /// `newer_subtotal − older_subtotal`.
    pub delta: Decimal,
}

/// Field-level change of one concepto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptoChange {
    /// Concepto ID.
    pub concepto_id: ConceptoId,
    /// Partida it belongs to (in the newer snapshot if present).
    pub partida_id: PartidaId,
    /// Short description.
    pub description: String,
    /// Classification; never `Unchanged`.
    pub kind: ChangeKind,
    /// Names of the fields that differ (empty for added/removed).
    pub changed_fields: Vec<String>,
    /// Total in the older snapshot.
    pub older_total: Option<Decimal>,
    /// Total in the newer snapshot.
    pub newer_total: Option<Decimal>,
}

/// Counts per change class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    /// Added records.
    pub added: u32,
    /// Removed records.
    pub removed: u32,
    /// Modified records.
    pub modified: u32,
    /// Unchanged records.
    pub unchanged: u32,
}

impl ChangeCounts {
    /// Counts one record of the given kind.
    pub fn record(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Added => self.added += 1,
            ChangeKind::Removed => self.removed += 1,
            ChangeKind::Modified => self.modified += 1,
            ChangeKind::Unchanged => self.unchanged += 1,
        }
    }
}

/// Structural delta between two snapshots of one budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotComparison {
    /// Budget both snapshots belong to.
    pub budget_id: BudgetId,
    /// Older snapshot ID.
    pub older_snapshot_id: SnapshotId,
    /// Newer snapshot ID.
    pub newer_snapshot_id: SnapshotId,
    /// Older version number.
    pub older_version: i32,
    /// Newer version number.
    pub newer_version: i32,
    /// Grand total of the older snapshot.
    pub older_grand_total: Decimal,
    /// Grand total of the newer snapshot.
    pub newer_grand_total: Decimal,
    /// `newer − older` grand total.
    pub delta_grand_total: Decimal,
    /// Delta relative to the older grand total, in percent (0 if it is 0).
    pub delta_percentage: Decimal,
    /// Partida changes, largest absolute delta first.
    pub partida_changes: Vec<PartidaChange>,
    /// Concepto changes (added, removed, modified).
    pub concepto_changes: Vec<ConceptoChange>,
    /// Partida counts.
    pub partida_counts: ChangeCounts,
    /// Concepto counts.
    pub concepto_counts: ChangeCounts,
}
