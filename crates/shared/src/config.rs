//! Application configuration management.
//!
//! `EngineConfig` replaces module-level constants: every tunable the engine
//! uses (fallback rates, tax policy, price thresholds, feature switches) is
//! passed in at construction time.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Configuration for the budgeting engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// System fallback rates for honorarios and desperdicio.
    #[serde(default)]
    pub defaults: DefaultRates,
    /// Tax policy used when neither the caller nor the budget supplies rates.
    #[serde(default)]
    pub tax: TaxPolicy,
    /// Price intelligence tuning.
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Feature switches.
    #[serde(default)]
    pub features: FeatureFlags,
}

/// System fallback percentages, expressed as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DefaultRates {
    /// Fee fraction applied on top of unit cost.
    #[serde(default = "default_honorarios_pct")]
    pub honorarios_pct: Decimal,
    /// Waste fraction applied on top of measured quantity.
    #[serde(default = "default_desperdicio_pct")]
    pub desperdicio_pct: Decimal,
}

fn default_honorarios_pct() -> Decimal {
    Decimal::new(17, 2)
}

fn default_desperdicio_pct() -> Decimal {
    Decimal::new(5, 2)
}

impl Default for DefaultRates {
    fn default() -> Self {
        Self {
            honorarios_pct: default_honorarios_pct(),
            desperdicio_pct: default_desperdicio_pct(),
        }
    }
}

/// Policy tax rates, expressed as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TaxPolicy {
    /// IVA rate (16% in the reference policy).
    #[serde(default = "default_iva_rate")]
    pub iva_rate: Decimal,
    /// Withholding rate.
    #[serde(default)]
    pub retenciones_rate: Decimal,
}

fn default_iva_rate() -> Decimal {
    Decimal::new(16, 2)
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            iva_rate: default_iva_rate(),
            retenciones_rate: Decimal::ZERO,
        }
    }
}

/// Price intelligence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PricingConfig {
    /// Trailing window for statistics, in days.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Absolute deviation (percent) at which a warning is raised.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold_pct: Decimal,
    /// Absolute deviation (percent) at which an error is raised.
    #[serde(default = "default_error_threshold")]
    pub error_threshold_pct: Decimal,
    /// Upper bound for a statistics lookup, in milliseconds.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Maximum number of cached statistics entries.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Time-to-live of cached statistics, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_window_days() -> u32 {
    90
}

fn default_warning_threshold() -> Decimal {
    Decimal::from(15)
}

fn default_error_threshold() -> Decimal {
    Decimal::from(30)
}

fn default_lookup_timeout_ms() -> u64 {
    5_000
}

fn default_cache_capacity() -> u64 {
    1_000
}

fn default_cache_ttl_secs() -> u64 {
    300 // 5 minutes
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            warning_threshold_pct: default_warning_threshold(),
            error_threshold_pct: default_error_threshold(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Feature switches for optional engine components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FeatureFlags {
    /// Record observations on publish and serve price statistics.
    #[serde(default = "enabled")]
    pub price_intelligence: bool,
    /// Allow templates to be merged into budgets.
    #[serde(default = "enabled")]
    pub templates: bool,
}

const fn enabled() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            price_intelligence: true,
            templates: true,
        }
    }
}

fn builder() -> Result<config::Config, config::ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

    config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
        .add_source(config::Environment::with_prefix("OBRA").separator("__"))
        .build()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        builder()?.try_deserialize()
    }
}

impl EngineConfig {
    /// Loads only the `engine` section, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value cannot be deserialized.
    pub fn load() -> Result<Self, config::ConfigError> {
        match builder()?.get::<Self>("engine") {
            Ok(engine) => Ok(engine),
            Err(config::ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }
}
