use sea_orm::entity::prelude::*;
use serde::Deserialize;
use serde::Serialize;

/// Catalog entry. Orders snapshot its title and price at creation and never read it again.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id:       i32,
    pub title:    String,
    pub price:    f64,
    pub category: String,
    /// List of image URLs.
    pub images:   Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_record::Entity")]
    InventoryRecord,
}

impl Related<super::inventory_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
