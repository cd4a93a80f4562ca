//! Common types used across the application.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{
    Currency, MoneyError, STORAGE_DECIMALS, DISPLAY_DECIMALS, format_currency,
    format_percentage, parse_decimal, parse_percentage, round_display, round_storage, safe_div,
};
