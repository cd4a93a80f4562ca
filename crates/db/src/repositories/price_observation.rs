//! Price observation repository: the append-only price log.

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};

use crate::entities::price_observations;
use obra_core::pricing::{
    ObservationSource, PriceObservation, PriceObservationRepository as PriceRepoTrait,
    PricingError,
};
use obra_shared::types::{BudgetId, PriceObservationId, ProjectId};

/// Price observation repository implementation.
#[derive(Debug, Clone)]
pub struct PriceObservationRepository {
    db: DatabaseConnection,
}

impl PriceObservationRepository {
    /// Create a new price observation repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl PriceRepoTrait for PriceObservationRepository {
    async fn insert_observation(
        &self,
        observation: PriceObservation,
    ) -> Result<PriceObservation, PricingError> {
        let active = price_observations::ActiveModel {
            id: Set(observation.id.into_inner()),
            cost_code: Set(observation.cost_code.clone()),
            unit: Set(observation.unit.clone()),
            unit_price: Set(observation.unit_price),
            currency: Set(observation.currency.code().to_string()),
            exchange_rate: Set(observation.exchange_rate),
            observed_on: Set(observation.observed_on),
            provider: Set(observation.provider.clone()),
            project_id: Set(observation.project_id.map(ProjectId::into_inner)),
            budget_id: Set(observation.budget_id.map(BudgetId::into_inner)),
            version_number: Set(observation.version_number),
            source: Set(observation.source.as_str().to_string()),
            created_at: Set(observation.created_at.into()),
        };

        match active.insert(&self.db).await {
            Ok(model) => to_domain(model),
            Err(e) if is_unique_violation(&e) => Err(PricingError::Duplicate {
                cost_code: observation.cost_code,
                unit: observation.unit,
            }),
            Err(e) => Err(PricingError::Repository(e.to_string())),
        }
    }

    async fn list_observations(
        &self,
        cost_code: &str,
        unit: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceObservation>, PricingError> {
        price_observations::Entity::find()
            .filter(price_observations::Column::CostCode.eq(cost_code))
            .filter(price_observations::Column::Unit.eq(unit))
            .filter(price_observations::Column::ObservedOn.between(from, to))
            .order_by_desc(price_observations::Column::ObservedOn)
            .order_by_desc(price_observations::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| PricingError::Repository(e.to_string()))?
            .into_iter()
            .map(to_domain)
            .collect()
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn to_domain(model: price_observations::Model) -> Result<PriceObservation, PricingError> {
    let source = ObservationSource::parse(&model.source).ok_or_else(|| {
        PricingError::Repository(format!("Unknown observation source: {}", model.source))
    })?;
    let currency = model.currency.parse().map_err(PricingError::Repository)?;
    Ok(PriceObservation {
        id: PriceObservationId::from_uuid(model.id),
        cost_code: model.cost_code,
        unit: model.unit,
        unit_price: model.unit_price,
        currency,
        exchange_rate: model.exchange_rate,
        observed_on: model.observed_on,
        provider: model.provider,
        project_id: model.project_id.map(ProjectId::from_uuid),
        budget_id: model.budget_id.map(BudgetId::from_uuid),
        version_number: model.version_number,
        source,
        created_at: model.created_at.to_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn model(source: &str, currency: &str) -> price_observations::Model {
        price_observations::Model {
            id: Uuid::now_v7(),
            cost_code: "03-100".to_string(),
            unit: "m3".to_string(),
            unit_price: dec!(1850.5),
            currency: currency.to_string(),
            exchange_rate: dec!(1),
            observed_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            provider: Some("Concretos del Bajío".to_string()),
            project_id: None,
            budget_id: Some(Uuid::now_v7()),
            version_number: Some(2),
            source: source.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_to_domain() {
        let observation = to_domain(model("budget_publish", "MXN")).unwrap();
        assert_eq!(observation.source, ObservationSource::BudgetPublish);
        assert_eq!(observation.version_number, Some(2));
        assert_eq!(observation.unit_price, dec!(1850.5));
    }

    #[test]
    fn test_unknown_source_or_currency_rejected() {
        assert!(matches!(
            to_domain(model("spreadsheet", "MXN")),
            Err(PricingError::Repository(_))
        ));
        assert!(matches!(
            to_domain(model("budget_publish", "XYZ")),
            Err(PricingError::Repository(_))
        ));
    }

    #[test]
    fn test_non_constraint_errors_are_not_duplicates() {
        assert!(!is_unique_violation(&DbErr::Custom("boom".to_string())));
    }
}
