use sea_orm::entity::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use crate::types::StockKey;

/// A line of an order. Title and price are snapshots taken at checkout.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id:          Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub position:          i32,
    pub product_id:        i32,
    pub title:             String,
    pub price:             f64,
    pub quantity:          i64,
    pub size:              Option<String>,
    pub color:             Option<String>,
    /// Part of the ledger's reserved counter this line holds.
    pub reserved_quantity: i64,
    /// Units of this line that have left the warehouse and not come back.
    pub shipped_quantity:  i64,
}

impl Model {
    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.product_id, self.size.as_deref().unwrap_or_default())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
