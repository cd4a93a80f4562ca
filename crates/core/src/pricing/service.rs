//! Price intelligence service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use obra_shared::config::{FeatureFlags, PricingConfig};
use obra_shared::types::{PriceObservationId, round_storage};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::cache::{PriceStatsCache, StatsKey};
use super::error::PricingError;
use super::statistics::{PriceAnalyzer, compute_statistics};
use super::types::{NewPriceObservation, PriceAlert, PriceObservation, PriceStatistics, RecordOutcome};
use crate::budget::validation;

/// Repository trait for price observation persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait PriceObservationRepository: Send + Sync {
    /// Insert an observation.
    ///
    /// Returns `PricingError::Duplicate` if one with the same
    /// (budget, cost code, unit, version) already exists.
    fn insert_observation(
        &self,
        observation: PriceObservation,
    ) -> impl std::future::Future<Output = Result<PriceObservation, PricingError>> + Send;

    /// List observations for a (cost code, unit) pair observed within
    /// `from..=to`, most recent first.
    fn list_observations(
        &self,
        cost_code: &str,
        unit: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Vec<PriceObservation>, PricingError>> + Send;
}

/// Trims a cost code.
#[must_use]
pub fn normalize_cost_code(cost_code: &str) -> String {
    cost_code.trim().to_string()
}

/// Trims and lowercases a unit of measure.
#[must_use]
pub fn normalize_unit(unit: &str) -> String {
    unit.trim().to_lowercase()
}

/// Price intelligence service: observation log, statistics and deviation
/// alerts.
pub struct PriceService<R: PriceObservationRepository> {
    repo: Arc<R>,
    cache: PriceStatsCache,
    analyzer: PriceAnalyzer,
    config: PricingConfig,
    enabled: bool,
}

impl<R: PriceObservationRepository> PriceService<R> {
    /// Create a new price service.
    #[must_use]
    pub fn new(repo: Arc<R>, config: PricingConfig, features: FeatureFlags) -> Self {
        Self {
            repo,
            cache: PriceStatsCache::with_config(config.cache_capacity, config.cache_ttl_secs),
            analyzer: PriceAnalyzer::from_config(&config),
            config,
            enabled: features.price_intelligence,
        }
    }

    /// Returns true if price intelligence is switched on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an observation. Duplicates are a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty code or unit, a negative
    /// price or a non-positive exchange rate, or a repository error.
    pub async fn record_observation(
        &self,
        input: NewPriceObservation,
    ) -> Result<RecordOutcome, PricingError> {
        if !self.enabled {
            return Ok(RecordOutcome::Disabled);
        }

        let cost_code = normalize_cost_code(&input.cost_code);
        let unit = normalize_unit(&input.unit);
        validation::require_non_empty("cost_code", &cost_code)?;
        validation::require_non_empty("unit", &unit)?;
        validation::require_non_negative("unit_price", input.unit_price)?;
        let exchange_rate = input.exchange_rate.unwrap_or(Decimal::ONE);
        if exchange_rate <= Decimal::ZERO {
            return Err(validation::ValidationError::new(
                "exchange_rate",
                format!("must be positive, got {exchange_rate}"),
            )
            .into());
        }

        let observation = PriceObservation {
            id: PriceObservationId::new(),
            cost_code,
            unit,
            unit_price: round_storage(input.unit_price * exchange_rate),
            currency: input.currency,
            exchange_rate,
            observed_on: input.observed_on,
            provider: input.provider,
            project_id: input.project_id,
            budget_id: input.budget_id,
            version_number: input.version_number,
            source: input.source,
            created_at: Utc::now(),
        };

        match self.repo.insert_observation(observation).await {
            Ok(stored) => {
                self.cache.invalidate_pair(&stored.cost_code, &stored.unit);
                Ok(RecordOutcome::Recorded(stored))
            }
            Err(PricingError::Duplicate { cost_code, unit }) => {
                debug!(cost_code = %cost_code, unit = %unit, "Duplicate price observation ignored");
                Ok(RecordOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    /// Statistics for the trailing window ending today.
    ///
    /// `window_days` defaults to the configured window. Returns `None` if
    /// there are no observations or the feature is switched off.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the observations cannot be read.
    pub async fn get_price_statistics(
        &self,
        cost_code: &str,
        unit: &str,
        window_days: Option<u32>,
    ) -> Result<Option<PriceStatistics>, PricingError> {
        self.get_price_statistics_as_of(cost_code, unit, window_days, Utc::now().date_naive())
            .await
    }

    /// Statistics for the `window_days` calendar days ending on `as_of`
    /// (inclusive). An observation exactly `window_days` old is outside the
    /// window; a zero-day window has no statistics.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the observations cannot be read.
    pub async fn get_price_statistics_as_of(
        &self,
        cost_code: &str,
        unit: &str,
        window_days: Option<u32>,
        as_of: NaiveDate,
    ) -> Result<Option<PriceStatistics>, PricingError> {
        if !self.enabled {
            return Ok(None);
        }

        let key = StatsKey {
            cost_code: normalize_cost_code(cost_code),
            unit: normalize_unit(unit),
            window_days: window_days.unwrap_or(self.config.window_days),
            as_of,
        };
        if let Some(cached) = self.cache.get(&key) {
            debug!(cost_code = %key.cost_code, unit = %key.unit, "Price statistics cache hit");
            return Ok(cached);
        }

        let Some(span) = key.window_days.checked_sub(1) else {
            return Ok(None);
        };
        let from = as_of
            .checked_sub_days(Days::new(u64::from(span)))
            .unwrap_or(NaiveDate::MIN);
        let observations = self
            .repo
            .list_observations(&key.cost_code, &key.unit, from, as_of)
            .await?;
        let stats = compute_statistics(&key.cost_code, &key.unit, key.window_days, &observations);

        self.cache.insert(key, stats.clone());
        Ok(stats)
    }

    /// Statistics bounded by the configured lookup timeout.
    ///
    /// A timeout or repository failure degrades to `None` ("no historical
    /// data") and is logged instead of returned.
    pub async fn statistics_within_timeout(
        &self,
        cost_code: &str,
        unit: &str,
        window_days: Option<u32>,
    ) -> Option<PriceStatistics> {
        let limit = Duration::from_millis(self.config.lookup_timeout_ms);
        match tokio::time::timeout(limit, self.get_price_statistics(cost_code, unit, window_days))
            .await
        {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                warn!(cost_code, unit, error = %e, "Price statistics lookup failed");
                None
            }
            Err(_) => {
                warn!(
                    cost_code,
                    unit,
                    timeout_ms = self.config.lookup_timeout_ms,
                    "Price statistics lookup timed out"
                );
                None
            }
        }
    }

    /// Classify a proposed price against statistics.
    #[must_use]
    pub fn analyze_deviation(
        &self,
        proposed: Decimal,
        stats: &PriceStatistics,
    ) -> Option<PriceAlert> {
        self.analyzer.analyze(proposed, stats)
    }

    /// Look up statistics within the timeout and classify a proposed price.
    ///
    /// Returns the statistics (if any) and the alert (if any).
    pub async fn check_price(
        &self,
        cost_code: &str,
        unit: &str,
        proposed: Decimal,
    ) -> (Option<PriceStatistics>, Option<PriceAlert>) {
        let stats = self.statistics_within_timeout(cost_code, unit, None).await;
        let alert = stats
            .as_ref()
            .and_then(|s| self.analyzer.analyze(proposed, s));
        (stats, alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::types::{AlertSeverity, ObservationSource};
    use crate::testing::InMemoryStore;
    use obra_shared::types::{BudgetId, Currency};
    use rust_decimal_macros::dec;

    fn service_with(
        store: &Arc<InMemoryStore>,
        config: PricingConfig,
        features: FeatureFlags,
    ) -> PriceService<InMemoryStore> {
        PriceService::new(Arc::clone(store), config, features)
    }

    fn service(store: &Arc<InMemoryStore>) -> PriceService<InMemoryStore> {
        service_with(store, PricingConfig::default(), FeatureFlags::default())
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn input(price: Decimal, budget_id: BudgetId, version: i32, days_ago: u64) -> NewPriceObservation {
        NewPriceObservation {
            cost_code: " 03-100 ".to_string(),
            unit: "M3".to_string(),
            unit_price: price,
            currency: Currency::Mxn,
            exchange_rate: None,
            observed_on: today().checked_sub_days(Days::new(days_ago)).unwrap(),
            provider: None,
            project_id: None,
            budget_id: Some(budget_id),
            version_number: Some(version),
            source: ObservationSource::BudgetPublish,
        }
    }

    #[tokio::test]
    async fn test_reference_scenario() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store);
        for (version, price) in [dec!(90), dec!(100), dec!(100), dec!(110), dec!(120)]
            .into_iter()
            .enumerate()
        {
            let version = i32::try_from(version).unwrap() + 1;
            service
                .record_observation(input(price, BudgetId::new(), version, 5))
                .await
                .unwrap();
        }

        let stats = service
            .get_price_statistics("03-100", "m3", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.median, dec!(100));
        assert_eq!(stats.sample_size, 5);

        let alert = service.analyze_deviation(dec!(70), &stats).unwrap();
        assert_eq!(alert.deviation_pct, dec!(-30));
        assert_eq!(alert.severity, AlertSeverity::Error);
    }

    #[tokio::test]
    async fn test_duplicate_is_silent_noop() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store);
        let budget_id = BudgetId::new();

        let first = service
            .record_observation(input(dec!(100), budget_id, 1, 0))
            .await
            .unwrap();
        let second = service
            .record_observation(input(dec!(999), budget_id, 1, 0))
            .await
            .unwrap();

        assert!(first.is_recorded());
        assert_eq!(second, RecordOutcome::Duplicate);
        assert_eq!(store.observation_count(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_normalised() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store);
        let outcome = service
            .record_observation(input(dec!(100), BudgetId::new(), 1, 0))
            .await
            .unwrap();
        let RecordOutcome::Recorded(stored) = outcome else {
            panic!("expected a recorded observation");
        };
        assert_eq!(stored.cost_code, "03-100");
        assert_eq!(stored.unit, "m3");
    }

    #[tokio::test]
    async fn test_window_excludes_old_observations() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store);
        service
            .record_observation(input(dec!(100), BudgetId::new(), 1, 10))
            .await
            .unwrap();
        service
            .record_observation(input(dec!(500), BudgetId::new(), 1, 200))
            .await
            .unwrap();

        let stats = service
            .get_price_statistics("03-100", "m3", Some(90))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.sample_size, 1);
        assert_eq!(stats.median, dec!(100));

        let none = service.get_price_statistics("99-999", "m3", None).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_window_spans_exactly_window_days() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store);
        service
            .record_observation(input(dec!(100), BudgetId::new(), 1, 29))
            .await
            .unwrap();
        service
            .record_observation(input(dec!(500), BudgetId::new(), 1, 30))
            .await
            .unwrap();

        let stats = service
            .get_price_statistics_as_of("03-100", "m3", Some(30), today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.sample_size, 1);
        assert_eq!(stats.last_price, dec!(100));

        let wider = service
            .get_price_statistics_as_of("03-100", "m3", Some(31), today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wider.sample_size, 2);

        let empty = service
            .get_price_statistics_as_of("03-100", "m3", Some(0), today())
            .await
            .unwrap();
        assert!(empty.is_none());
    }

    #[tokio::test]
    async fn test_recording_invalidates_cached_statistics() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store);
        service
            .record_observation(input(dec!(100), BudgetId::new(), 1, 1))
            .await
            .unwrap();
        let before = service
            .get_price_statistics("03-100", "m3", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.sample_size, 1);

        service
            .record_observation(input(dec!(200), BudgetId::new(), 1, 0))
            .await
            .unwrap();
        let after = service
            .get_price_statistics("03-100", "m3", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.sample_size, 2);
        assert_eq!(after.last_price, dec!(200));
    }

    #[tokio::test]
    async fn test_exchange_rate_converts_to_base_currency() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store);
        let mut usd = input(dec!(10), BudgetId::new(), 1, 0);
        usd.currency = Currency::Usd;
        usd.exchange_rate = Some(dec!(17.25));

        let RecordOutcome::Recorded(stored) = service.record_observation(usd).await.unwrap() else {
            panic!("expected a recorded observation");
        };
        assert_eq!(stored.unit_price, dec!(172.5));
        assert_eq!(stored.currency, Currency::Usd);
    }

    #[tokio::test]
    async fn test_invalid_exchange_rate_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store);
        let mut bad = input(dec!(10), BudgetId::new(), 1, 0);
        bad.exchange_rate = Some(Decimal::ZERO);
        assert!(matches!(
            service.record_observation(bad).await,
            Err(PricingError::Validation(ref e)) if e.field == "exchange_rate"
        ));
    }

    #[tokio::test]
    async fn test_disabled_feature() {
        let store = Arc::new(InMemoryStore::new());
        let service = service_with(
            &store,
            PricingConfig::default(),
            FeatureFlags {
                price_intelligence: false,
                templates: true,
            },
        );
        let outcome = service
            .record_observation(input(dec!(100), BudgetId::new(), 1, 0))
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Disabled);
        assert_eq!(store.observation_count(), 0);
        assert!(
            service
                .get_price_statistics("03-100", "m3", None)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_slow_lookup_degrades_to_no_data() {
        let store = Arc::new(InMemoryStore::new());
        store.set_read_delay(Duration::from_millis(200));
        let service = service_with(
            &store,
            PricingConfig {
                lookup_timeout_ms: 20,
                ..PricingConfig::default()
            },
            FeatureFlags::default(),
        );

        let (stats, alert) = service.check_price("03-100", "m3", dec!(100)).await;
        assert!(stats.is_none());
        assert!(alert.is_none());
    }

    #[tokio::test]
    async fn test_failing_lookup_degrades_to_no_data() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_observation_reads(true);
        let service = service(&store);
        assert!(
            service
                .statistics_within_timeout("03-100", "m3", None)
                .await
                .is_none()
        );
    }
}
