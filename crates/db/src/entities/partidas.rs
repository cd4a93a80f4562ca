//! `SeaORM` Entity for partidas table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "partidas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub budget_id: Uuid,
    pub name: String,
    pub order_index: i32,
    pub is_active: bool,
    pub notes: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))", nullable)]
    pub honorarios_pct_override: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))", nullable)]
    pub desperdicio_pct_override: Option<Decimal>,
    pub cost_code: Option<String>,
    pub template_partida_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budgets::Entity",
        from = "Column::BudgetId",
        to = "super::budgets::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Budgets,
    #[sea_orm(has_many = "super::conceptos::Entity")]
    Conceptos,
}

impl Related<super::budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl Related<super::conceptos::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conceptos.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
