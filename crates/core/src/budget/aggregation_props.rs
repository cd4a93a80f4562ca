//! Property-based tests for budget aggregation.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::aggregation::BudgetAggregator;
use super::types::TaxRates;
use crate::testing::fixtures;

/// Stored total with 6 decimals, 0 to 1,000,000.
fn total() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000_000i64).prop_map(|micro| Decimal::new(micro, 6))
}

/// A line item: (total, active, sumable).
fn item() -> impl Strategy<Value = (Decimal, bool, bool)> {
    (total(), any::<bool>(), any::<bool>())
}

fn rate() -> impl Strategy<Value = Decimal> {
    (0i64..=3_000i64).prop_map(|bp| Decimal::new(bp, 4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Totals equal the sum of active, sumable items and satisfy the
    /// grand-total identity; computing twice gives identical results.
    #[test]
    fn prop_totals_consistent(
        partidas in prop::collection::vec(
            (any::<bool>(), prop::collection::vec(item(), 0..8)),
            0..6,
        ),
        iva_rate in rate(),
        retenciones_rate in rate(),
    ) {
        let mut state = fixtures::budget_state();
        let mut expected = Decimal::ZERO;

        for (index, (partida_active, items)) in partidas.iter().enumerate() {
            let mut partida = fixtures::partida(
                state.budget.id,
                &format!("Partida {index}"),
                i32::try_from(index).unwrap_or(0),
            );
            partida.is_active = *partida_active;
            for (value, active, sumable) in items {
                let mut concepto = fixtures::concepto_with_total(partida.id, *value, *sumable);
                concepto.is_active = *active;
                if *partida_active && *active && *sumable {
                    expected += *value;
                }
                state.conceptos.push(concepto);
            }
            state.partidas.push(partida);
        }

        let rates = TaxRates { iva_rate, retenciones_rate };
        let totals = BudgetAggregator::calculate(&state, rates);

        prop_assert_eq!(totals.subtotal, expected);
        prop_assert_eq!(
            totals.grand_total,
            totals.subtotal + totals.iva_amount - totals.retenciones
        );
        prop_assert_eq!(
            totals.partidas.iter().map(|p| p.subtotal).sum::<Decimal>(),
            totals.subtotal
        );
        prop_assert_eq!(BudgetAggregator::calculate(&state, rates), totals);
    }
}
