//! Window statistics and deviation classification.
//!
//! Percentiles use the nearest-rank method over prices sorted ascending:
//! `rank = ceil(p × n / 100)`, clamped to `1..=n`. No interpolation, so the
//! result is always one of the observed prices and identical input sets
//! always give identical output.

use obra_shared::config::PricingConfig;
use obra_shared::types::{round_display, safe_div};
use rust_decimal::Decimal;

use super::types::{AlertSeverity, PriceAlert, PriceObservation, PriceStatistics};

/// Returns the nearest-rank percentile of an ascending slice.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn nearest_rank(sorted: &[Decimal], percentile: u32) -> Option<Decimal> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let p = usize::try_from(percentile.min(100)).unwrap_or(100);
    let rank = (p * n).div_ceil(100).clamp(1, n);
    sorted.get(rank - 1).copied()
}

/// Computes statistics over a set of observations.
///
/// Returns `None` if there are no observations.
#[must_use]
pub fn compute_statistics(
    cost_code: &str,
    unit: &str,
    window_days: u32,
    observations: &[PriceObservation],
) -> Option<PriceStatistics> {
    let latest = observations
        .iter()
        .max_by_key(|o| (o.observed_on, o.created_at))?;

    let mut prices: Vec<Decimal> = observations.iter().map(|o| o.unit_price).collect();
    prices.sort();

    let median = nearest_rank(&prices, 50)?;
    Some(PriceStatistics {
        cost_code: cost_code.to_string(),
        unit: unit.to_string(),
        window_days,
        sample_size: u32::try_from(prices.len()).unwrap_or(u32::MAX),
        median,
        p25: nearest_rank(&prices, 25)?,
        p75: nearest_rank(&prices, 75)?,
        last_price: latest.unit_price,
        last_observed_on: latest.observed_on,
        recommended_pu: median,
    })
}

/// Classifies proposed prices against historical statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceAnalyzer {
    warning_threshold_pct: Decimal,
    error_threshold_pct: Decimal,
}

impl PriceAnalyzer {
    /// Creates an analyzer with explicit thresholds, in percent.
    #[must_use]
    pub const fn new(warning_threshold_pct: Decimal, error_threshold_pct: Decimal) -> Self {
        Self {
            warning_threshold_pct,
            error_threshold_pct,
        }
    }

    /// Creates an analyzer from the pricing configuration.
    #[must_use]
    pub const fn from_config(config: &PricingConfig) -> Self {
        Self::new(config.warning_threshold_pct, config.error_threshold_pct)
    }

    /// Signed deviation of `proposed` from `median`, in percent.
    #[must_use]
    pub fn deviation_pct(proposed: Decimal, median: Decimal) -> Decimal {
        safe_div(proposed - median, median) * Decimal::ONE_HUNDRED
    }

    /// Classifies a proposed price. Returns `None` below the warning
    /// threshold or when the median is zero.
    ///
    /// Only classifies; whether to require the justification is up to the
    /// caller.
    #[must_use]
    pub fn analyze(&self, proposed: Decimal, stats: &PriceStatistics) -> Option<PriceAlert> {
        if stats.median.is_zero() {
            return None;
        }

        let deviation = Self::deviation_pct(proposed, stats.median);
        let magnitude = deviation.abs();
        let severity = if magnitude >= self.error_threshold_pct {
            AlertSeverity::Error
        } else if magnitude >= self.warning_threshold_pct {
            AlertSeverity::Warning
        } else {
            return None;
        };

        let deviation_pct = round_display(deviation);
        let sign = if deviation_pct.is_sign_positive() { "+" } else { "" };
        let message = format!(
            "Proposed price {proposed} deviates {sign}{deviation_pct:.2}% from the historical median of {median}",
            median = stats.median,
        );

        Some(PriceAlert {
            severity,
            deviation_pct,
            proposed,
            median: stats.median,
            requires_justification: severity == AlertSeverity::Error,
            message,
        })
    }
}

impl Default for PriceAnalyzer {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn stats_over(prices: &[Decimal]) -> PriceStatistics {
        let observations: Vec<PriceObservation> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| fixtures::observation("03-100", "m3", *p, i64::try_from(i).unwrap()))
            .collect();
        compute_statistics("03-100", "m3", 90, &observations).unwrap()
    }

    #[test]
    fn test_reference_statistics() {
        let stats = stats_over(&[dec!(90), dec!(100), dec!(100), dec!(110), dec!(120)]);
        assert_eq!(stats.median, dec!(100));
        assert_eq!(stats.p25, dec!(100));
        assert_eq!(stats.p75, dec!(110));
        assert_eq!(stats.sample_size, 5);
        assert_eq!(stats.recommended_pu, dec!(100));
    }

    #[test]
    fn test_reference_deviation_is_error() {
        let stats = stats_over(&[dec!(90), dec!(100), dec!(100), dec!(110), dec!(120)]);
        let alert = PriceAnalyzer::default().analyze(dec!(70), &stats).unwrap();
        assert_eq!(alert.deviation_pct, dec!(-30));
        assert_eq!(alert.severity, AlertSeverity::Error);
        assert!(alert.requires_justification);
        assert!(alert.message.contains("-30.00%"));
    }

    #[rstest]
    #[case(dec!(115), Some(AlertSeverity::Warning))]
    #[case(dec!(130), Some(AlertSeverity::Error))]
    #[case(dec!(114.99), None)]
    #[case(dec!(85), Some(AlertSeverity::Warning))]
    #[case(dec!(85.01), None)]
    #[case(dec!(100), None)]
    #[case(dec!(200), Some(AlertSeverity::Error))]
    fn test_deviation_boundaries(
        #[case] proposed: Decimal,
        #[case] expected: Option<AlertSeverity>,
    ) {
        let stats = stats_over(&[dec!(100)]);
        let alert = PriceAnalyzer::default().analyze(proposed, &stats);
        assert_eq!(alert.map(|a| a.severity), expected);
    }

    #[test]
    fn test_warning_does_not_require_justification() {
        let stats = stats_over(&[dec!(100)]);
        let alert = PriceAnalyzer::default().analyze(dec!(115), &stats).unwrap();
        assert!(!alert.requires_justification);
        assert!(alert.message.contains("+15.00%"));
    }

    #[test]
    fn test_zero_median_gives_no_alert() {
        let stats = stats_over(&[dec!(0), dec!(0), dec!(0)]);
        assert!(PriceAnalyzer::default().analyze(dec!(50), &stats).is_none());
    }

    #[test]
    fn test_empty_observations() {
        assert!(compute_statistics("03-100", "m3", 90, &[]).is_none());
        assert_eq!(nearest_rank(&[], 50), None);
    }

    #[rstest]
    #[case(&[dec!(7)], 50, dec!(7))]
    #[case(&[dec!(1), dec!(2)], 50, dec!(1))]
    #[case(&[dec!(1), dec!(2), dec!(3), dec!(4)], 25, dec!(1))]
    #[case(&[dec!(1), dec!(2), dec!(3), dec!(4)], 75, dec!(3))]
    #[case(&[dec!(1), dec!(2), dec!(3)], 0, dec!(1))]
    #[case(&[dec!(1), dec!(2), dec!(3)], 100, dec!(3))]
    fn test_nearest_rank(#[case] sorted: &[Decimal], #[case] p: u32, #[case] expected: Decimal) {
        assert_eq!(nearest_rank(sorted, p), Some(expected));
    }

    #[test]
    fn test_last_price_is_most_recent() {
        let observations = vec![
            fixtures::observation("03-100", "m3", dec!(100), 10),
            fixtures::observation("03-100", "m3", dec!(130), 1),
            fixtures::observation("03-100", "m3", dec!(90), 30),
        ];
        let stats = compute_statistics("03-100", "m3", 90, &observations).unwrap();
        assert_eq!(stats.last_price, dec!(130));
        assert_eq!(stats.last_observed_on, observations[1].observed_on);
    }
}
