//! `SeaORM` Entity for price_observations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "price_observations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cost_code: String,
    pub unit: String,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub unit_price: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub exchange_rate: Decimal,
    pub observed_on: Date,
    pub provider: Option<String>,
    pub project_id: Option<Uuid>,
    pub budget_id: Option<Uuid>,
    pub version_number: Option<i32>,
    pub source: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
