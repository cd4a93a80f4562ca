//! `SeaORM` Entity for template_partidas table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "template_partidas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub order_index: i32,
    pub cost_code: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::templates::Entity",
        from = "Column::TemplateId",
        to = "super::templates::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Templates,
    #[sea_orm(has_many = "super::template_conceptos::Entity")]
    TemplateConceptos,
}

impl Related<super::templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Templates.def()
    }
}

impl Related<super::template_conceptos::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TemplateConceptos.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
