//! Monetary primitives with decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Values are computed at full `Decimal` precision, stored at
//! [`STORAGE_DECIMALS`] and rendered at [`DISPLAY_DECIMALS`], always rounding
//! half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Decimal places kept for stored quantities, prices and totals.
pub const STORAGE_DECIMALS: u32 = 6;

/// Decimal places used when rendering currency and percentages.
pub const DISPLAY_DECIMALS: u32 = 2;

/// Errors raised while parsing user-entered numbers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Input is empty after trimming.
    #[error("value is empty")]
    Empty,

    /// Input is not a decimal number.
    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

/// ISO 4217 currency codes supported by the system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Mexican Peso (base currency)
    #[default]
    Mxn,
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// Canadian Dollar
    Cad,
}

impl Currency {
    /// Returns the ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Mxn => "MXN",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Cad => "CAD",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MXN" => Ok(Self::Mxn),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "CAD" => Ok(Self::Cad),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}

/// Rounds to storage precision (6 dp, half-up).
#[must_use]
pub fn round_storage(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(STORAGE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to display precision (2 dp, half-up).
#[must_use]
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Divides, yielding zero instead of failing on a zero divisor or overflow.
#[must_use]
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// Parses a user-entered amount such as `"$1,234.50"`.
///
/// Currency symbols, thousands separators and surrounding whitespace are
/// ignored.
pub fn parse_decimal(input: &str) -> Result<Decimal, MoneyError> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' ' | '_'))
        .collect();

    if cleaned.is_empty() {
        return Err(MoneyError::Empty);
    }

    Decimal::from_str(&cleaned).map_err(|_| MoneyError::InvalidNumber(input.trim().to_string()))
}

/// Parses a percentage in points (`"17"`, `"17.5%"`) into a fraction.
pub fn parse_percentage(input: &str) -> Result<Decimal, MoneyError> {
    let trimmed = input.trim();
    let points = trimmed.strip_suffix('%').unwrap_or(trimmed);
    let value = parse_decimal(points)?;
    Ok(value / Decimal::ONE_HUNDRED)
}

/// Formats a fraction as a percentage with two decimals (`0.175` → `"17.50%"`).
#[must_use]
pub fn format_percentage(fraction: Decimal) -> String {
    let points = round_display(fraction * Decimal::ONE_HUNDRED);
    format!("{points:.2}%")
}

/// Formats an amount with thousands separators and two decimals.
#[must_use]
pub fn format_currency(amount: Decimal) -> String {
    let rounded = round_display(amount);
    let text = format!("{:.2}", rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(1.0000005), dec!(1.000001))]
    #[case(dec!(1.0000004), dec!(1.000000))]
    #[case(dec!(-1.0000005), dec!(-1.000001))]
    #[case(dec!(2.5), dec!(2.5))]
    fn test_round_storage(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_storage(input), expected);
    }

    #[rstest]
    #[case(dec!(0.125), dec!(0.13))]
    #[case(dec!(0.135), dec!(0.14))]
    #[case(dec!(1739.994), dec!(1739.99))]
    fn test_round_display_is_half_up(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_display(input), expected);
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(dec!(10), dec!(4)), dec!(2.5));
        assert_eq!(safe_div(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_div(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[rstest]
    #[case("1234.5", dec!(1234.5))]
    #[case(" $1,234.50 ", dec!(1234.50))]
    #[case("-12", dec!(-12))]
    #[case("0.000001", dec!(0.000001))]
    fn test_parse_decimal(#[case] input: &str, #[case] expected: Decimal) {
        assert_eq!(parse_decimal(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_decimal_errors() {
        assert_eq!(parse_decimal("   "), Err(MoneyError::Empty));
        assert!(matches!(
            parse_decimal("12abc"),
            Err(MoneyError::InvalidNumber(_))
        ));
    }

    #[rstest]
    #[case("17", dec!(0.17))]
    #[case("17.5%", dec!(0.175))]
    #[case(" 5 % ", dec!(0.05))]
    #[case("0", dec!(0))]
    fn test_parse_percentage(#[case] input: &str, #[case] expected: Decimal) {
        assert_eq!(parse_percentage(input).unwrap(), expected);
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(dec!(0.175)), "17.50%");
        assert_eq!(format_percentage(dec!(0.05)), "5.00%");
        assert_eq!(format_percentage(dec!(-0.3)), "-30.00%");
    }

    #[rstest]
    #[case(dec!(1740), "1,740.00")]
    #[case(dec!(1234567.891), "1,234,567.89")]
    #[case(dec!(999.995), "1,000.00")]
    #[case(dec!(12.3), "12.30")]
    #[case(dec!(-1500), "-1,500.00")]
    #[case(dec!(0), "0.00")]
    fn test_format_currency(#[case] amount: Decimal, #[case] expected: &str) {
        assert_eq!(format_currency(amount), expected);
    }

    #[test]
    fn test_currency_round_trip() {
        assert_eq!(Currency::from_str("mxn").unwrap(), Currency::Mxn);
        assert_eq!(Currency::Usd.to_string(), "USD");
        assert_eq!(Currency::default(), Currency::Mxn);
        assert!(Currency::from_str("XXX").is_err());
    }
}
