//! Property-based tests for price statistics and deviation alerts.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::statistics::{PriceAnalyzer, compute_statistics};
use super::types::{AlertSeverity, PriceObservation};
use crate::testing::fixtures;

fn price() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn observations(prices: &[Decimal]) -> Vec<PriceObservation> {
    prices
        .iter()
        .enumerate()
        .map(|(i, p)| fixtures::observation("03-100", "m3", *p, i64::try_from(i).unwrap_or(0)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Percentiles are observed prices and are ordered P25 ≤ median ≤ P75.
    #[test]
    fn prop_percentiles_ordered(prices in prop::collection::vec(price(), 1..40)) {
        let stats = compute_statistics("03-100", "m3", 90, &observations(&prices)).unwrap();

        prop_assert!(stats.p25 <= stats.median);
        prop_assert!(stats.median <= stats.p75);
        prop_assert!(prices.contains(&stats.median));
        prop_assert!(prices.contains(&stats.p25));
        prop_assert!(prices.contains(&stats.p75));
        prop_assert_eq!(stats.recommended_pu, stats.median);
        prop_assert_eq!(stats.sample_size as usize, prices.len());
    }

    /// Statistics do not depend on the order observations arrive in.
    #[test]
    fn prop_order_independent(prices in prop::collection::vec(price(), 1..40)) {
        let forward = compute_statistics("03-100", "m3", 90, &observations(&prices)).unwrap();
        let mut reversed_prices = prices.clone();
        reversed_prices.reverse();
        let reversed = compute_statistics("03-100", "m3", 90, &observations(&reversed_prices)).unwrap();

        prop_assert_eq!(forward.median, reversed.median);
        prop_assert_eq!(forward.p25, reversed.p25);
        prop_assert_eq!(forward.p75, reversed.p75);
    }

    /// Severity follows the magnitude of the deviation.
    #[test]
    fn prop_severity_matches_magnitude(
        median_prices in prop::collection::vec(price(), 1..10),
        proposed in price(),
    ) {
        let stats = compute_statistics("03-100", "m3", 90, &observations(&median_prices)).unwrap();
        let deviation = PriceAnalyzer::deviation_pct(proposed, stats.median).abs();
        let alert = PriceAnalyzer::default().analyze(proposed, &stats);

        match alert.map(|a| (a.severity, a.requires_justification)) {
            None => prop_assert!(deviation < Decimal::from(15)),
            Some((AlertSeverity::Warning, false)) => {
                prop_assert!(deviation >= Decimal::from(15) && deviation < Decimal::from(30));
            }
            Some((AlertSeverity::Error, true)) => prop_assert!(deviation >= Decimal::from(30)),
            Some(other) => prop_assert!(false, "inconsistent alert {:?}", other),
        }
    }
}
