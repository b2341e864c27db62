use sea_orm::entity::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use crate::types::InventoryStatus;
use crate::types::StockKey;

/// Stock counters of a product or one of its size variants.
///
/// `available_quantity` and `inventory_status` are derived from the other counters by [`Model::settle`] and are
/// stored only to make them queryable.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id:          i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub variant:             String,
    pub stock_quantity:      i64,
    pub reserved_quantity:   i64,
    pub available_quantity:  i64,
    pub inventory_status:    InventoryStatus,
    pub low_stock_threshold: i64,
    pub updated_at:          DateTimeUtc,
}

impl Model {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, &self.variant)
    }

    /// Recompute the derived fields. Must be the last step of every mutation.
    pub fn settle(&mut self) {
        self.available_quantity = self.stock_quantity - self.reserved_quantity;
        self.inventory_status = InventoryStatus::classify(self.available_quantity, self.low_stock_threshold);
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.available_quantity == self.stock_quantity - self.reserved_quantity
            && self.reserved_quantity >= 0
            && self.inventory_status == InventoryStatus::classify(self.available_quantity, self.low_stock_threshold)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
