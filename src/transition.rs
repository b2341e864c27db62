//! What an order status change does to the inventory.
//!
//! [`plan`] is a total function over status pairs; the engine applies the planned movement to every line of the
//! order and keeps the per-line bookkeeping (`reserved_quantity`, `shipped_quantity`) in step with the ledger, which is
//! what makes repeated cleanups harmless.
use sea_orm::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::ActiveValue::Unchanged;
use sea_orm::DatabaseTransaction;
use tracing::debug;

use crate::db::entity::order_item;
use crate::db::prelude::*;
use crate::error::Result;
use crate::ledger::Attribution;
use crate::ledger::InventoryLedger;
use crate::stockroom::StoreProvider;
use crate::types::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LedgerMove {
    /// Units leave the warehouse, consuming the reservation held for them.
    ShipOut,
    /// Whatever reservation a line still holds after delivery is returned to available.
    ReleaseRemaining,
    /// The reservation of a cancelled active order is returned to available.
    Release,
    /// Shipped units come back into stock.
    Restock,
}

/// The ledger movement a status change calls for, if any.
///
/// | from \ to                         | shipped | delivered          | cancelled |
/// |-----------------------------------|---------|--------------------|-----------|
/// | pending, confirmed, processing    | ship    |                    | release   |
/// | shipped                           |         | release remaining  | restock   |
/// | delivered                         | ship    |                    | restock   |
/// | cancelled                         | ship    |                    |           |
///
/// Every other change, including any change to the same status, leaves the inventory alone.
pub fn plan(from: OrderStatus, to: OrderStatus) -> Option<LedgerMove> {
    use crate::types::OrderStatus::*;

    match (from, to) {
        (from, to) if from == to => None,
        (_, Shipped) => Some(LedgerMove::ShipOut),
        (Shipped, Delivered) => Some(LedgerMove::ReleaseRemaining),
        (Pending | Confirmed | Processing, Cancelled) => Some(LedgerMove::Release),
        (Shipped | Delivered, Cancelled) => Some(LedgerMove::Restock),
        _ => None,
    }
}

pub struct TransitionEngine<'l, P: StoreProvider> {
    ledger: &'l InventoryLedger<P>,
}

impl<'l, P: StoreProvider> TransitionEngine<'l, P> {
    pub fn new(ledger: &'l InventoryLedger<P>) -> Self {
        Self { ledger }
    }

    /// Apply the inventory effect of moving an order from `from` to `to`. Returns the order lines with their updated
    /// bookkeeping.
    pub async fn apply(
        &self,
        txn: &DatabaseTransaction,
        items: Vec<OrderItem>,
        from: OrderStatus,
        to: OrderStatus,
        attribution: &Attribution,
    ) -> Result<Vec<OrderItem>> {
        let Some(movement) = plan(from, to)
        else {
            return Ok(items);
        };

        debug!("{from} -> {to}: {movement} for {} line(s)", items.len());
        self.ledger
            .lock_keys(txn, items.iter().map(OrderItem::stock_key))
            .await?;

        let mut updated = Vec::with_capacity(items.len());
        for item in items {
            let item = match movement {
                LedgerMove::ShipOut => self.ship_out(txn, item, attribution).await?,
                LedgerMove::ReleaseRemaining => {
                    self.release_held(txn, item, &attribution.because("Remaining reservation released on delivery"))
                        .await?
                }
                LedgerMove::Release => {
                    self.release_held(txn, item, &attribution.because("Order cancelled"))
                        .await?
                }
                LedgerMove::Restock => self.restock(txn, item, attribution).await?,
            };
            updated.push(item);
        }
        Ok(updated)
    }

    async fn ship_out(&self, txn: &DatabaseTransaction, item: OrderItem, attribution: &Attribution) -> Result<OrderItem> {
        let to_ship = item.quantity - item.shipped_quantity;
        if to_ship <= 0 {
            return Ok(item);
        }
        self.ledger
            .ship_out(
                txn,
                &item.stock_key(),
                to_ship,
                item.reserved_quantity,
                &attribution.because("Order shipped"),
            )
            .await?;
        let shipped = item.shipped_quantity + to_ship;
        self.record_line(txn, &item, 0, shipped).await
    }

    async fn release_held(
        &self,
        txn: &DatabaseTransaction,
        item: OrderItem,
        attribution: &Attribution,
    ) -> Result<OrderItem> {
        if item.reserved_quantity <= 0 {
            return Ok(item);
        }
        self.ledger
            .release(txn, &item.stock_key(), item.reserved_quantity, attribution)
            .await?;
        self.record_line(txn, &item, 0, item.shipped_quantity).await
    }

    async fn restock(&self, txn: &DatabaseTransaction, item: OrderItem, attribution: &Attribution) -> Result<OrderItem> {
        let item = self
            .release_held(txn, item, &attribution.because("Order cancelled"))
            .await?;
        if item.shipped_quantity <= 0 {
            return Ok(item);
        }
        self.ledger
            .restock(
                txn,
                &item.stock_key(),
                item.shipped_quantity,
                &attribution.because("Shipped order cancelled, goods returned to stock"),
            )
            .await?;
        self.record_line(txn, &item, item.reserved_quantity, 0).await
    }

    async fn record_line(
        &self,
        txn: &DatabaseTransaction,
        item: &OrderItem,
        reserved: i64,
        shipped: i64,
    ) -> Result<OrderItem> {
        let am = order_item::ActiveModel {
            order_id: Unchanged(item.order_id),
            position: Unchanged(item.position),
            reserved_quantity: Set(reserved),
            shipped_quantity: Set(shipped),
            ..Default::default()
        };
        am.update(txn).await?;
        Ok(OrderItem {
            reserved_quantity: reserved,
            shipped_quantity: shipped,
            ..item.clone()
        })
    }
}
