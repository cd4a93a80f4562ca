//! `SeaORM` Entity for conceptos table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "conceptos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub partida_id: Uuid,
    pub code: Option<String>,
    pub description: String,
    pub long_description: Option<String>,
    pub unit: String,
    pub provider: Option<String>,
    pub is_active: bool,
    pub is_sumable: bool,
    pub order_index: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub properties: Json,
    pub wbs_code: Option<String>,
    pub template_concepto_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub cantidad_real: Decimal,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))", nullable)]
    pub desperdicio_pct: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub precio_real: Decimal,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))", nullable)]
    pub honorarios_pct: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub cantidad: Decimal,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub pu: Decimal,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub total_real: Decimal,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub total: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::partidas::Entity",
        from = "Column::PartidaId",
        to = "super::partidas::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Partidas,
}

impl Related<super::partidas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partidas.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
