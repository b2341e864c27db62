//! Order creation, status changes and deletion, each one transaction.
use std::fmt::Debug;

use chrono::Utc;
use fieldx_plus::fx_plus;
use garde::Validate;
use rand::distr::Alphanumeric;
use rand::Rng;
use sea_orm::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::ConnectionTrait;
use sea_orm::DatabaseTransaction;
use sea_orm::IntoActiveModel;
use sea_orm::QueryOrder;
use sea_orm::QuerySelect;
use sea_orm::TransactionTrait;
use tracing::info;
use tracing::instrument;

use crate::api::LineItemRequest;
use crate::api::OrderSubmission;
use crate::api::OrderView;
use crate::api::StatusUpdate;
use crate::db::entity::order;
use crate::db::entity::order_item;
use crate::db::prelude::*;
use crate::error::LedgerError;
use crate::error::Result;
use crate::ledger::Attribution;
use crate::stockroom::with_retries;
use crate::stockroom::StoreProvider;
use crate::transition::TransitionEngine;
use crate::types::OrderStatus;
use crate::types::PaymentStatus;

/// `ORD-<unix millis>-<6 random alphanumerics>`
pub fn order_number() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix.to_uppercase())
}

#[fx_plus(
    child(P, unwrap(or_else(LedgerError, crate::stockroom::provider_gone("order lifecycle")))),
    sync,
    rc
)]
pub struct OrderLifecycle<P>
where
    P: StoreProvider, {}

impl<P> OrderLifecycle<P>
where
    P: StoreProvider,
{
    /// Validate a checkout, reserve stock for every line and persist the order as `pending`. Nothing is reserved or
    /// stored unless every line can be reserved.
    #[instrument(level = "debug", skip_all, fields(lines = submission.items.len()))]
    pub async fn create_order(&self, submission: OrderSubmission, performed_by: Option<&str>) -> Result<OrderView> {
        submission.validate()?;

        let provider = self.parent()?;
        let config = provider.ledger_config();
        let actor = config.actor_or_default(performed_by);

        let view = with_retries(&config, "create order", || {
            self.try_create_order(&provider, &submission, &actor)
        })
        .await?;

        info!(
            "Order {} placed by {actor}: {} line(s), total {:.2}",
            view.order.order_number,
            view.items.len(),
            view.order.total
        );
        Ok(view)
    }

    async fn try_create_order(&self, provider: &P, submission: &OrderSubmission, actor: &str) -> Result<OrderView> {
        let inventory = provider.inventory()?;
        let order_id = Uuid::new_v4();
        let order_number = order_number();
        let attribution = Attribution::new(actor)
            .with_reference(&order_number)
            .because("Reserved at checkout");
        let now = Utc::now();

        let txn = provider.db_connection().begin().await?;

        inventory
            .lock_keys(&txn, submission.items.iter().map(LineItemRequest::stock_key))
            .await?;
        for line in &submission.items {
            inventory
                .reserve(&txn, &line.stock_key(), line.quantity, &attribution)
                .await?;
        }

        let shipping = &submission.shipping_info;
        let order = order::ActiveModel {
            id:                 Set(order_id),
            order_number:       Set(order_number),
            status:             Set(OrderStatus::Pending),
            payment_status:     Set(PaymentStatus::Pending),
            customer_name:      Set(shipping.name.clone()),
            email:              Set(shipping.email.clone()),
            phone:              Set(shipping.phone.clone()),
            address:            Set(shipping.address.clone()),
            city:               Set(shipping.city.clone()),
            postal_code:        Set(shipping.postal_code.clone()),
            payment_method:     Set(submission.payment_method),
            delivery_type:      Set(submission.delivery_type),
            subtotal:           Set(submission.subtotal),
            discount_total:     Set(submission.discount_total),
            shipping_charge:    Set(submission.shipping_charge),
            total:              Set(submission.total),
            estimated_delivery: Set(submission.estimated_delivery.clone()),
            notes:              Set(None),
            tracking_number:    Set(None),
            created_at:         Set(now),
            updated_at:         Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(submission.items.len());
        for (position, line) in submission.items.iter().enumerate() {
            let item = order_item::ActiveModel {
                order_id:          Set(order_id),
                position:          Set(position as i32),
                product_id:        Set(line.product_id),
                title:             Set(line.title.clone()),
                price:             Set(line.price),
                quantity:          Set(line.quantity),
                size:              Set(line.size.clone()),
                color:             Set(line.color.clone()),
                reserved_quantity: Set(line.quantity),
                shipped_quantity:  Set(0),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;
        Ok(OrderView { order, items })
    }

    /// Move an order to another status, applying its inventory effect first. A request for the current status only
    /// stores the notes and tracking number it carries.
    #[instrument(level = "debug", skip(self, update, performed_by), fields(to = %update.status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        update: StatusUpdate,
        performed_by: Option<&str>,
    ) -> Result<OrderView> {
        let provider = self.parent()?;
        let config = provider.ledger_config();
        let actor = config.actor_or_default(performed_by);

        let (from, view) = with_retries(&config, "update order status", || {
            self.try_update_status(&provider, order_id, &update, &actor)
        })
        .await?;

        if from != view.order.status {
            info!(
                "Order {} {from} -> {} by {actor}",
                view.order.order_number, view.order.status
            );
        }
        Ok(view)
    }

    async fn try_update_status(
        &self,
        provider: &P,
        order_id: Uuid,
        update: &StatusUpdate,
        actor: &str,
    ) -> Result<(OrderStatus, OrderView)> {
        let inventory = provider.inventory()?;
        let txn = provider.db_connection().begin().await?;

        let order = lock_order(&txn, order_id).await?;
        let items = order_lines(&txn, order_id).await?;
        let (from, to) = (order.status, update.status);
        let attribution = Attribution::new(actor).with_reference(&order.order_number);

        let items = TransitionEngine::new(&inventory)
            .apply(&txn, items, from, to, &attribution)
            .await?;

        let mut am = order.into_active_model();
        if from != to {
            am.status = Set(to);
            if to == OrderStatus::Delivered {
                am.payment_status = Set(PaymentStatus::Paid);
            }
        }
        if let Some(notes) = &update.notes {
            am.notes = Set(Some(notes.clone()));
        }
        if let Some(tracking_number) = &update.tracking_number {
            am.tracking_number = Set(Some(tracking_number.clone()));
        }
        am.updated_at = Set(Utc::now());
        let order = am.update(&txn).await?;

        txn.commit().await?;
        Ok((from, OrderView { order, items }))
    }

    /// Delete an order and its lines. An order which still holds a reservation gives it back first.
    #[instrument(level = "debug", skip(self, performed_by))]
    pub async fn delete_order(&self, order_id: Uuid, performed_by: Option<&str>) -> Result<OrderView> {
        let provider = self.parent()?;
        let config = provider.ledger_config();
        let actor = config.actor_or_default(performed_by);

        let view = with_retries(&config, "delete order", || {
            self.try_delete_order(&provider, order_id, &actor)
        })
        .await?;

        info!(
            "Order {} ({}) deleted by {actor}",
            view.order.order_number, view.order.status
        );
        Ok(view)
    }

    async fn try_delete_order(&self, provider: &P, order_id: Uuid, actor: &str) -> Result<OrderView> {
        let inventory = provider.inventory()?;
        let txn = provider.db_connection().begin().await?;

        let order = lock_order(&txn, order_id).await?;
        let items = order_lines(&txn, order_id).await?;

        if order.status.is_active() {
            let attribution = Attribution::new(actor)
                .with_reference(&order.order_number)
                .because("Order deleted");
            inventory
                .lock_keys(&txn, items.iter().map(OrderItem::stock_key))
                .await?;
            for item in items.iter().filter(|i| i.reserved_quantity > 0) {
                inventory
                    .release(&txn, &item.stock_key(), item.reserved_quantity, &attribution)
                    .await?;
            }
        }

        OrderItems::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        Orders::delete_by_id(order_id).exec(&txn).await?;

        txn.commit().await?;
        Ok(OrderView { order, items })
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderView> {
        let db = self.parent()?.db_connection();
        let order = Orders::find_by_id(order_id)
            .one(&db)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))?;
        let items = order_lines(&db, order_id).await?;
        Ok(OrderView { order, items })
    }

    pub async fn find_order(&self, order_number: &str) -> Result<OrderView> {
        let db = self.parent()?.db_connection();
        let order = Orders::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&db)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_number.to_string()))?;
        let items = order_lines(&db, order.id).await?;
        Ok(OrderView { order, items })
    }

    /// Orders in the given status, newest first.
    pub async fn orders_in(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(Orders::find()
            .filter(order::Column::Status.eq(status))
            .order_by_desc(order::Column::CreatedAt)
            .all(&self.parent()?.db_connection())
            .await?)
    }
}

impl<P> Debug for OrderLifecycle<P>
where
    P: StoreProvider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLifecycle")
    }
}

pub(crate) async fn lock_order(txn: &DatabaseTransaction, order_id: Uuid) -> Result<Order> {
    Orders::find_by_id(order_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))
}

pub(crate) async fn order_lines<C: ConnectionTrait>(db: &C, order_id: Uuid) -> Result<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Position)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = order_number();
        let parts: Vec<&str> = number.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok(), "{number}");
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(order_number(), number);
    }
}
