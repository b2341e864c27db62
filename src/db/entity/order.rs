use sea_orm::entity::prelude::*;
use serde::Deserialize;
use serde::Serialize;

use crate::types::DeliveryType;
use crate::types::OrderStatus;
use crate::types::PaymentMethod;
use crate::types::PaymentStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id:                 Uuid,
    #[sea_orm(unique)]
    pub order_number:       String,
    pub status:             OrderStatus,
    pub payment_status:     PaymentStatus,
    pub customer_name:      String,
    pub email:              Option<String>,
    pub phone:              String,
    pub address:            String,
    pub city:               String,
    pub postal_code:        Option<String>,
    pub payment_method:     PaymentMethod,
    pub delivery_type:      DeliveryType,
    // Money fields are persisted as submitted by the checkout.
    pub subtotal:           f64,
    pub discount_total:     f64,
    pub shipping_charge:    f64,
    pub total:              f64,
    pub estimated_delivery: Option<String>,
    pub notes:              Option<String>,
    pub tracking_number:    Option<String>,
    pub created_at:         DateTimeUtc,
    pub updated_at:         DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
