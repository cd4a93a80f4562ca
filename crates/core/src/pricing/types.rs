//! Price intelligence types.

use chrono::{DateTime, NaiveDate, Utc};
use obra_shared::types::{BudgetId, Currency, PriceObservationId, ProjectId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of a price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationSource {
    /// Recorded from a concepto when its budget was published.
    BudgetPublish,
    /// Imported from a real purchase or transaction.
    ExternalActual,
}

impl ObservationSource {
    /// Returns the string representation of the source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetPublish => "budget_publish",
            Self::ExternalActual => "external_actual",
        }
    }

    /// Parses a source from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "budget_publish" => Some(Self::BudgetPublish),
            "external_actual" => Some(Self::ExternalActual),
            _ => None,
        }
    }
}

impl fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded price fact. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Observation ID.
    pub id: PriceObservationId,
    /// Normalised cost code.
    pub cost_code: String,
    /// Normalised unit of measure.
    pub unit: String,
    /// Unit price converted to the base currency.
    pub unit_price: Decimal,
    /// Currency the price was observed in.
    pub currency: Currency,
    /// Rate used to convert to the base currency.
    pub exchange_rate: Decimal,
    /// Observation date.
    pub observed_on: NaiveDate,
    /// Optional provider.
    pub provider: Option<String>,
    /// Optional project linkage.
    pub project_id: Option<ProjectId>,
    /// Optional budget linkage.
    pub budget_id: Option<BudgetId>,
    /// Budget version the price was published in.
    pub version_number: Option<i32>,
    /// Origin of the observation.
    pub source: ObservationSource,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for recording an observation.
#[derive(Debug, Clone)]
pub struct NewPriceObservation {
    /// Cost code; trimmed before storage.
    pub cost_code: String,
    /// Unit; trimmed and lowercased before storage.
    pub unit: String,
    /// Unit price in `currency`.
    pub unit_price: Decimal,
    /// Currency of `unit_price`.
    pub currency: Currency,
    /// Conversion rate to the base currency; 1 when omitted.
    pub exchange_rate: Option<Decimal>,
    /// Observation date.
    pub observed_on: NaiveDate,
    /// Optional provider.
    pub provider: Option<String>,
    /// Optional project linkage.
    pub project_id: Option<ProjectId>,
    /// Optional budget linkage.
    pub budget_id: Option<BudgetId>,
    /// Budget version the price was published in.
    pub version_number: Option<i32>,
    /// Origin of the observation.
    pub source: ObservationSource,
}

/// Result of recording an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new observation was stored.
    Recorded(PriceObservation),
    /// An observation with the same key already exists; nothing was written.
    Duplicate,
    /// Price intelligence is switched off; nothing was written.
    Disabled,
}

impl RecordOutcome {
    /// Returns true if a new row was stored.
    #[must_use]
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Statistics over the observations of a (cost code, unit) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceStatistics {
    /// Cost code.
    pub cost_code: String,
    /// Unit of measure.
    pub unit: String,
    /// Trailing window the statistics cover, in days.
    pub window_days: u32,
    /// Number of observations.
    pub sample_size: u32,
    /// Nearest-rank median.
    pub median: Decimal,
    /// Nearest-rank 25th percentile.
    pub p25: Decimal,
    /// Nearest-rank 75th percentile.
    pub p75: Decimal,
    /// Most recent observed price.
    pub last_price: Decimal,
    /// Date of the most recent observation.
    pub last_observed_on: NaiveDate,
    /// Suggested unit price (the median).
    pub recommended_pu: Decimal,
}

/// Severity of a price deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Noticeable deviation.
    Warning,
    /// Large deviation; a justification should be required.
    Error,
}

/// A proposed price's deviation from the historical median.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAlert {
    /// Severity.
    pub severity: AlertSeverity,
    /// Signed deviation in percent, at display precision.
    pub deviation_pct: Decimal,
    /// Proposed price.
    pub proposed: Decimal,
    /// Median it was compared against.
    pub median: Decimal,
    /// Whether the caller should ask for a justification.
    pub requires_justification: bool,
    /// Human-readable message stating the signed deviation.
    pub message: String,
}
