//! Resolution of effective honorarios and desperdicio percentages.

use obra_shared::config::DefaultRates;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{BudgetSettings, Concepto, Partida};

/// Percentage overrides carried by a partida.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartidaOverrides {
    /// Fee override.
    pub honorarios_pct: Option<Decimal>,
    /// Waste override.
    pub desperdicio_pct: Option<Decimal>,
}

impl From<&Partida> for PartidaOverrides {
    fn from(partida: &Partida) -> Self {
        Self {
            honorarios_pct: partida.honorarios_pct_override,
            desperdicio_pct: partida.desperdicio_pct_override,
        }
    }
}

/// Effective fractions applied to a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRates {
    /// Fee fraction.
    pub honorarios_pct: Decimal,
    /// Waste fraction.
    pub desperdicio_pct: Decimal,
}

/// Resolves effective percentages through the partida → budget → system chain.
pub struct DefaultsResolver;

impl DefaultsResolver {
    /// Resolves the rates a partida's items inherit.
    ///
    /// Precedence, highest first: partida override, budget default, system
    /// fallback. Values are not capped here.
    #[must_use]
    pub fn resolve(
        settings: &BudgetSettings,
        overrides: PartidaOverrides,
        fallback: &DefaultRates,
    ) -> EffectiveRates {
        EffectiveRates {
            honorarios_pct: overrides
                .honorarios_pct
                .or(settings.honorarios_pct_default)
                .unwrap_or(fallback.honorarios_pct),
            desperdicio_pct: overrides
                .desperdicio_pct
                .or(settings.desperdicio_pct_default)
                .unwrap_or(fallback.desperdicio_pct),
        }
    }

    /// Resolves the rates for one concepto: an explicit item value wins over
    /// everything its partida would pass down.
    #[must_use]
    pub fn resolve_for_item(
        honorarios_pct: Option<Decimal>,
        desperdicio_pct: Option<Decimal>,
        inherited: EffectiveRates,
    ) -> EffectiveRates {
        EffectiveRates {
            honorarios_pct: honorarios_pct.unwrap_or(inherited.honorarios_pct),
            desperdicio_pct: desperdicio_pct.unwrap_or(inherited.desperdicio_pct),
        }
    }

    /// Returns true if `concepto` takes at least one rate from its partida
    /// or budget, so a change there requires recomputing it.
    #[must_use]
    pub const fn inherits(concepto: &Concepto) -> bool {
        concepto.honorarios_pct.is_none() || concepto.desperdicio_pct.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings(honorarios: Option<Decimal>, desperdicio: Option<Decimal>) -> BudgetSettings {
        BudgetSettings {
            honorarios_pct_default: honorarios,
            desperdicio_pct_default: desperdicio,
            ..BudgetSettings::default()
        }
    }

    #[test]
    fn test_partida_override_wins() {
        let overrides = PartidaOverrides {
            honorarios_pct: Some(dec!(0.20)),
            desperdicio_pct: None,
        };
        let rates = DefaultsResolver::resolve(
            &settings(Some(dec!(0.17)), Some(dec!(0.03))),
            overrides,
            &DefaultRates::default(),
        );
        assert_eq!(rates.honorarios_pct, dec!(0.20));
        assert_eq!(rates.desperdicio_pct, dec!(0.03));
    }

    #[test]
    fn test_removing_override_falls_back_to_budget_default() {
        let rates = DefaultsResolver::resolve(
            &settings(Some(dec!(0.17)), None),
            PartidaOverrides::default(),
            &DefaultRates::default(),
        );
        assert_eq!(rates.honorarios_pct, dec!(0.17));
    }

    #[test]
    fn test_system_fallback() {
        let rates = DefaultsResolver::resolve(
            &BudgetSettings::default(),
            PartidaOverrides::default(),
            &DefaultRates::default(),
        );
        assert_eq!(rates.honorarios_pct, dec!(0.17));
        assert_eq!(rates.desperdicio_pct, dec!(0.05));
    }

    #[test]
    fn test_fallback_comes_from_configuration() {
        let fallback = DefaultRates {
            honorarios_pct: dec!(0.10),
            desperdicio_pct: dec!(0.02),
        };
        let rates = DefaultsResolver::resolve(
            &BudgetSettings::default(),
            PartidaOverrides::default(),
            &fallback,
        );
        assert_eq!(rates.honorarios_pct, dec!(0.10));
        assert_eq!(rates.desperdicio_pct, dec!(0.02));
    }

    #[test]
    fn test_explicit_zero_override_is_respected() {
        let overrides = PartidaOverrides {
            honorarios_pct: Some(Decimal::ZERO),
            desperdicio_pct: Some(Decimal::ZERO),
        };
        let rates = DefaultsResolver::resolve(
            &settings(Some(dec!(0.17)), Some(dec!(0.05))),
            overrides,
            &DefaultRates::default(),
        );
        assert_eq!(rates.honorarios_pct, Decimal::ZERO);
        assert_eq!(rates.desperdicio_pct, Decimal::ZERO);
    }

    #[test]
    fn test_item_value_wins_over_inherited() {
        let inherited = EffectiveRates {
            honorarios_pct: dec!(0.20),
            desperdicio_pct: dec!(0.05),
        };
        let rates = DefaultsResolver::resolve_for_item(Some(dec!(0)), None, inherited);
        assert_eq!(rates.honorarios_pct, dec!(0));
        assert_eq!(rates.desperdicio_pct, dec!(0.05));
    }

    #[test]
    fn test_uncapped() {
        let rates = DefaultsResolver::resolve(
            &settings(Some(dec!(2.5)), None),
            PartidaOverrides::default(),
            &DefaultRates::default(),
        );
        assert_eq!(rates.honorarios_pct, dec!(2.5));
    }
}
