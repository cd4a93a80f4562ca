//! Property-based tests for line-item formulas and defaults resolution.

use obra_shared::config::DefaultRates;
use obra_shared::types::round_storage;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::defaults::{DefaultsResolver, EffectiveRates, PartidaOverrides};
use super::line_item::LineItemCalculator;
use super::types::BudgetSettings;
use super::validation::MAX_AMOUNT;

/// Non-negative quantity with up to 6 decimals, 0 to 1,000,000.
fn quantity() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000_000i64).prop_map(|micro| Decimal::new(micro, 6))
}

/// Non-negative unit cost with cents, 0 to 10,000,000.00.
fn price() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Any amount validation accepts, up to the 10^18 column limit.
fn storable() -> impl Strategy<Value = Decimal> {
    (0i128..1_000_000_000_000_000_000_000_000i128)
        .prop_map(|micro| Decimal::from_i128_with_scale(micro, 6))
}

/// Fraction in [0, 1] with 4 decimals.
fn fraction() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|bp| Decimal::new(bp, 4))
}

fn optional_fraction() -> impl Strategy<Value = Option<Decimal>> {
    prop_oneof![Just(None), fraction().prop_map(Some)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Derived fields follow their formulas for any non-negative inputs.
    #[test]
    fn prop_formulas_hold(
        cantidad_real in quantity(),
        precio_real in price(),
        honorarios in fraction(),
        desperdicio in fraction(),
    ) {
        let rates = EffectiveRates { honorarios_pct: honorarios, desperdicio_pct: desperdicio };
        let derived = LineItemCalculator::compute(cantidad_real, precio_real, rates).unwrap();

        prop_assert_eq!(derived.pu, round_storage(precio_real * (Decimal::ONE + honorarios)));
        prop_assert_eq!(derived.cantidad, round_storage(cantidad_real * (Decimal::ONE + desperdicio)));
        prop_assert_eq!(derived.total_real, round_storage(precio_real * cantidad_real));
        prop_assert_eq!(derived.total, round_storage(derived.pu * derived.cantidad));
    }

    /// Derived fields are never negative and stay at storage precision.
    #[test]
    fn prop_derived_non_negative(
        cantidad_real in quantity(),
        precio_real in price(),
        honorarios in fraction(),
        desperdicio in fraction(),
    ) {
        let rates = EffectiveRates { honorarios_pct: honorarios, desperdicio_pct: desperdicio };
        let derived = LineItemCalculator::compute(cantidad_real, precio_real, rates).unwrap();

        for value in [derived.cantidad, derived.pu, derived.total_real, derived.total] {
            prop_assert!(value >= Decimal::ZERO);
            prop_assert!(value.scale() <= 6);
        }
    }

    /// Any pair of accepted amounts yields either bounded totals or an error.
    #[test]
    fn prop_compute_never_overflows(
        cantidad_real in storable(),
        precio_real in storable(),
        honorarios in fraction(),
        desperdicio in fraction(),
    ) {
        let rates = EffectiveRates { honorarios_pct: honorarios, desperdicio_pct: desperdicio };
        match LineItemCalculator::compute(cantidad_real, precio_real, rates) {
            Ok(derived) => {
                for value in [derived.cantidad, derived.pu, derived.total_real, derived.total] {
                    prop_assert!(value < MAX_AMOUNT);
                }
            }
            Err(err) => prop_assert!(!err.message.is_empty()),
        }
    }

    /// Resolution always takes the highest tier that is set.
    #[test]
    fn prop_resolution_precedence(
        override_pct in optional_fraction(),
        budget_default in optional_fraction(),
        fallback in fraction(),
    ) {
        let settings = BudgetSettings {
            honorarios_pct_default: budget_default,
            ..BudgetSettings::default()
        };
        let overrides = PartidaOverrides { honorarios_pct: override_pct, desperdicio_pct: None };
        let defaults = DefaultRates { honorarios_pct: fallback, desperdicio_pct: fallback };

        let rates = DefaultsResolver::resolve(&settings, overrides, &defaults);
        let expected = override_pct.or(budget_default).unwrap_or(fallback);
        prop_assert_eq!(rates.honorarios_pct, expected);
    }
}
