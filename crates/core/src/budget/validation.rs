//! Input validation for budget records.
//!
//! Every check runs before anything is persisted and names the offending
//! field so a caller can attach the message to the right input.

use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{
    BudgetSettings, CreateConceptoInput, CreatePartidaInput, TaxSettings, UpdateConceptoInput,
    UpdatePartidaInput,
};

/// Exclusive upper bound of any stored amount: 10^18, the integer range of
/// a NUMERIC(24,6) column.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

/// A rejected input value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Rejects empty or whitespace-only strings.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

/// Rejects negative numbers.
pub fn require_non_negative(field: &str, value: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO {
        return Err(ValidationError::new(
            field,
            format!("must not be negative, got {value}"),
        ));
    }
    Ok(())
}

/// Rejects negative amounts and amounts at or above [`MAX_AMOUNT`].
pub fn require_amount(field: &str, value: Decimal) -> Result<(), ValidationError> {
    require_non_negative(field, value)?;
    if value >= MAX_AMOUNT {
        return Err(ValidationError::new(
            field,
            format!("must be below {MAX_AMOUNT}, got {value}"),
        ));
    }
    Ok(())
}

/// Rejects fractions outside `[0, 1]`.
pub fn require_fraction(field: &str, value: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ValidationError::new(
            field,
            format!("must be a fraction between 0 and 1, got {value}"),
        ));
    }
    Ok(())
}

fn optional_fraction(field: &str, value: Option<Decimal>) -> Result<(), ValidationError> {
    value.map_or(Ok(()), |v| require_fraction(field, v))
}

/// Validates budget settings.
pub fn validate_settings(settings: &BudgetSettings) -> Result<(), ValidationError> {
    optional_fraction("honorarios_pct_default", settings.honorarios_pct_default)?;
    optional_fraction("desperdicio_pct_default", settings.desperdicio_pct_default)?;
    if let Some(tax) = &settings.tax {
        validate_tax_settings(tax)?;
    }
    if settings.cost_mayor_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ValidationError::new(
            "cost_mayor_ids",
            "must not contain empty codes",
        ));
    }
    Ok(())
}

/// Validates tax rates.
pub fn validate_tax_settings(tax: &TaxSettings) -> Result<(), ValidationError> {
    require_fraction("iva_rate", tax.iva_rate)?;
    require_fraction("retenciones_rate", tax.retenciones_rate)
}

/// Validates a new partida.
pub fn validate_create_partida(input: &CreatePartidaInput) -> Result<(), ValidationError> {
    require_non_empty("name", &input.name)?;
    optional_fraction("honorarios_pct_override", input.honorarios_pct_override)?;
    optional_fraction("desperdicio_pct_override", input.desperdicio_pct_override)
}

/// Validates a partida patch.
pub fn validate_update_partida(input: &UpdatePartidaInput) -> Result<(), ValidationError> {
    if let Some(name) = &input.name {
        require_non_empty("name", name)?;
    }
    optional_fraction(
        "honorarios_pct_override",
        input.honorarios_pct_override.flatten(),
    )?;
    optional_fraction(
        "desperdicio_pct_override",
        input.desperdicio_pct_override.flatten(),
    )
}

/// Validates a new concepto.
pub fn validate_create_concepto(input: &CreateConceptoInput) -> Result<(), ValidationError> {
    require_non_empty("description", &input.description)?;
    require_non_empty("unit", &input.unit)?;
    require_amount("cantidad_real", input.cantidad_real)?;
    require_amount("precio_real", input.precio_real)?;
    optional_fraction("honorarios_pct", input.honorarios_pct)?;
    optional_fraction("desperdicio_pct", input.desperdicio_pct)
}

/// Validates a concepto patch.
pub fn validate_update_concepto(input: &UpdateConceptoInput) -> Result<(), ValidationError> {
    if let Some(description) = &input.description {
        require_non_empty("description", description)?;
    }
    if let Some(unit) = &input.unit {
        require_non_empty("unit", unit)?;
    }
    if let Some(cantidad_real) = input.cantidad_real {
        require_amount("cantidad_real", cantidad_real)?;
    }
    if let Some(precio_real) = input.precio_real {
        require_amount("precio_real", precio_real)?;
    }
    optional_fraction("honorarios_pct", input.honorarios_pct.flatten())?;
    optional_fraction("desperdicio_pct", input.desperdicio_pct.flatten())
}
