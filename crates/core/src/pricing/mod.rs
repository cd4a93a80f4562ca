//! Price intelligence.
//!
//! An append-only observation log keyed by (cost code, unit), trailing-window
//! statistics (median, P25, P75, last seen) and deviation alerts for proposed
//! prices.

pub mod cache;
pub mod error;
pub mod service;
pub mod statistics;
pub mod types;

#[cfg(test)]
mod statistics_props;

pub use cache::{PriceStatsCache, StatsKey};
pub use error::PricingError;
pub use service::{PriceObservationRepository, PriceService, normalize_cost_code, normalize_unit};
pub use statistics::{PriceAnalyzer, compute_statistics, nearest_rank};
pub use types::{
    AlertSeverity, NewPriceObservation, ObservationSource, PriceAlert, PriceObservation,
    PriceStatistics, RecordOutcome,
};
