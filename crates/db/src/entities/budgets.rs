//! `SeaORM` Entity for budgets table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub name: String,
    pub currency: String,
    pub status: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub settings: Json,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::partidas::Entity")]
    Partidas,
    #[sea_orm(has_many = "super::budget_snapshots::Entity")]
    BudgetSnapshots,
}

impl Related<super::partidas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partidas.def()
    }
}

impl Related<super::budget_snapshots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetSnapshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
