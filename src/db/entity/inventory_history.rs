use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use crate::types::HistoryKind;

/// One entry of the inventory audit trail. Entries are only ever inserted.
///
/// Previous and new quantities are those of the counter the entry changed: the reserved counter for reservations,
/// releases and reservation resyncs, the physical stock for everything else.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id:                i64,
    pub product_id:        i32,
    pub variant:           String,
    pub date:              DateTimeUtc,
    pub kind:              HistoryKind,
    pub quantity:          i64,
    pub previous_quantity: i64,
    pub new_quantity:      i64,
    pub reason:            String,
    /// Order number or another document the change originates from.
    pub reference:         Option<String>,
    pub performed_by:      String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            return Err(DbErr::Custom("inventory history is append-only".to_string()));
        }
        Ok(self)
    }

    async fn before_delete<C>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Err(DbErr::Custom("inventory history is append-only".to_string()))
    }
}
