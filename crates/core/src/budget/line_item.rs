//! Derived quantity, price and total of a line item.

use obra_shared::types::round_storage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::defaults::{DefaultsResolver, EffectiveRates};
use super::types::Concepto;
use super::validation::{MAX_AMOUNT, ValidationError};

/// Derived fields of a concepto at storage precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAmounts {
    /// `cantidad_real × (1 + desperdicio)`.
    pub cantidad: Decimal,
    /// `precio_real × (1 + honorarios)`.
    pub pu: Decimal,
    /// `precio_real × cantidad_real`.
    pub total_real: Decimal,
    /// `pu × cantidad`, using the stored values.
    pub total: Decimal,
}

/// Pure line-item formulas.
pub struct LineItemCalculator;

impl LineItemCalculator {
    /// Computes derived amounts from stored inputs and effective rates.
    ///
    /// `total` multiplies the already rounded `pu` and `cantidad`, so it
    /// always equals the product of the values a reader sees stored.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the derived field whose value
    /// would not fit the storage column (`|x| < 10^18`).
    pub fn compute(
        cantidad_real: Decimal,
        precio_real: Decimal,
        rates: EffectiveRates,
    ) -> Result<DerivedAmounts, ValidationError> {
        let cantidad = storable(
            "cantidad",
            cantidad_real.checked_mul(Decimal::ONE + rates.desperdicio_pct),
        )?;
        let pu = storable(
            "pu",
            precio_real.checked_mul(Decimal::ONE + rates.honorarios_pct),
        )?;
        Ok(DerivedAmounts {
            cantidad,
            pu,
            total_real: storable("total_real", precio_real.checked_mul(cantidad_real))?,
            total: storable("total", pu.checked_mul(cantidad))?,
        })
    }

    /// Recomputes a concepto in place against the rates its partida passes
    /// down. Returns true if any derived field changed.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a derived field overflows; the
    /// concepto is left untouched in that case.
    pub fn recompute(
        concepto: &mut Concepto,
        inherited: EffectiveRates,
    ) -> Result<bool, ValidationError> {
        let rates = DefaultsResolver::resolve_for_item(
            concepto.honorarios_pct,
            concepto.desperdicio_pct,
            inherited,
        );
        let derived = Self::compute(concepto.cantidad_real, concepto.precio_real, rates)?;
        let changed = concepto.cantidad != derived.cantidad
            || concepto.pu != derived.pu
            || concepto.total_real != derived.total_real
            || concepto.total != derived.total;

        concepto.cantidad = derived.cantidad;
        concepto.pu = derived.pu;
        concepto.total_real = derived.total_real;
        concepto.total = derived.total;
        Ok(changed)
    }
}

/// Rounds a checked product to storage precision, rejecting overflow and
/// values the NUMERIC(24,6) columns cannot hold.
fn storable(field: &str, value: Option<Decimal>) -> Result<Decimal, ValidationError> {
    value
        .map(round_storage)
        .filter(|v| v.abs() < MAX_AMOUNT)
        .ok_or_else(|| {
            ValidationError::new(field, format!("exceeds the storable maximum of {MAX_AMOUNT}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use obra_shared::types::PartidaId;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn rates(honorarios: Decimal, desperdicio: Decimal) -> EffectiveRates {
        EffectiveRates {
            honorarios_pct: honorarios,
            desperdicio_pct: desperdicio,
        }
    }

    #[test]
    fn test_compute_basic() {
        let derived = LineItemCalculator::compute(dec!(10), dec!(100), rates(dec!(0.17), dec!(0.05))).unwrap();
        assert_eq!(derived.cantidad, dec!(10.5));
        assert_eq!(derived.pu, dec!(117));
        assert_eq!(derived.total_real, dec!(1000));
        assert_eq!(derived.total, dec!(1228.5));
    }

    #[rstest]
    #[case(dec!(0), dec!(100))]
    #[case(dec!(10), dec!(0))]
    #[case(dec!(0), dec!(0))]
    fn test_zero_inputs_give_zero_totals(#[case] cantidad_real: Decimal, #[case] precio: Decimal) {
        let derived = LineItemCalculator::compute(cantidad_real, precio, rates(dec!(0.17), dec!(0.05))).unwrap();
        assert_eq!(derived.total, Decimal::ZERO);
        assert_eq!(derived.total_real, Decimal::ZERO);
    }

    #[test]
    fn test_total_uses_rounded_components() {
        let derived = LineItemCalculator::compute(
            dec!(3.333333),
            dec!(1.111111),
            rates(dec!(0.1234567), dec!(0.0333333)),
        )
        .unwrap();
        assert_eq!(derived.pu, round_storage(dec!(1.111111) * dec!(1.1234567)));
        assert_eq!(derived.cantidad, round_storage(dec!(3.333333) * dec!(1.0333333)));
        assert_eq!(derived.total, round_storage(derived.pu * derived.cantidad));
        assert!(derived.total.scale() <= 6);
    }

    #[test]
    fn test_explicit_zero_rates() {
        let derived = LineItemCalculator::compute(dec!(4), dec!(25), rates(dec!(0), dec!(0))).unwrap();
        assert_eq!(derived.pu, dec!(25));
        assert_eq!(derived.cantidad, dec!(4));
        assert_eq!(derived.total, derived.total_real);
    }

    #[test]
    fn test_overflowing_product_is_rejected_not_panicking() {
        let err = LineItemCalculator::compute(
            Decimal::new(1_000_000_000_000_000, 0),
            Decimal::new(1_000_000_000_000_000, 0),
            rates(dec!(0.17), dec!(0.05)),
        )
        .unwrap_err();
        assert_eq!(err.field, "total_real");
    }

    #[test]
    fn test_total_beyond_column_range_is_rejected() {
        // total_real fits, total with both rates applied does not
        let err = LineItemCalculator::compute(
            Decimal::new(1_000_000_000, 0),
            Decimal::new(900_000_000, 0),
            rates(dec!(0.17), dec!(0.05)),
        )
        .unwrap_err();
        assert_eq!(err.field, "total");
    }

    #[test]
    fn test_recompute_leaves_concepto_untouched_on_overflow() {
        let mut concepto = fixtures::concepto_with_total(PartidaId::new(), dec!(10), true);
        concepto.cantidad_real = Decimal::new(999_999_999_999_999_999, 0);
        concepto.precio_real = Decimal::new(999_999_999_999_999_999, 0);
        let before = concepto.clone();

        assert!(LineItemCalculator::recompute(&mut concepto, rates(dec!(0), dec!(0))).is_err());
        assert_eq!(concepto, before);
    }
}
