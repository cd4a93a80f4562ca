//! `SeaORM` Entity for template_conceptos table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "template_conceptos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub template_partida_id: Uuid,
    pub code: Option<String>,
    pub description: String,
    pub long_description: Option<String>,
    pub unit: String,
    pub wbs_code: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub cantidad: Decimal,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))")]
    pub precio_real: Decimal,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))", nullable)]
    pub honorarios_pct: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((24, 6)))", nullable)]
    pub desperdicio_pct: Option<Decimal>,
    pub order_index: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::template_partidas::Entity",
        from = "Column::TemplatePartidaId",
        to = "super::template_partidas::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    TemplatePartidas,
}

impl Related<super::template_partidas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TemplatePartidas.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
