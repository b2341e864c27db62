//! Repairs of the reserved counters.
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Debug;

use fieldx_plus::fx_plus;
use sea_orm::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::ActiveValue::Unchanged;
use sea_orm::DatabaseTransaction;
use sea_orm::JoinType;
use sea_orm::QueryOrder;
use sea_orm::QuerySelect;
use sea_orm::RelationTrait;
use sea_orm::TransactionTrait;
use serde::Serialize;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::db::entity::inventory_history;
use crate::db::entity::inventory_record;
use crate::db::entity::order;
use crate::db::entity::order_item;
use crate::db::prelude::*;
use crate::error::LedgerError;
use crate::error::Result;
use crate::ledger::Attribution;
use crate::lifecycle::lock_order;
use crate::lifecycle::order_lines;
use crate::stockroom::with_retries;
use crate::stockroom::StoreProvider;
use crate::types::HistoryKind;
use crate::types::OrderStatus;
use crate::types::StockKey;

const DRIFT_REASON: &str = "Reservation left after delivery";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservedCorrection {
    pub key:      StockKey,
    pub previous: i64,
    pub new:      i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    /// Number of inventory records examined.
    pub checked:    usize,
    pub corrected:  Vec<ReservedCorrection>,
    /// Active order lines whose held amount was brought back to what they still have to ship.
    pub realigned:  usize,
    /// Keys claimed by active order lines which have no inventory record.
    pub orphaned:   Vec<StockKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftRepair {
    pub order_number: String,
    /// Units released per inventory record.
    pub released:     Vec<(StockKey, i64)>,
}

impl DriftRepair {
    pub fn total_released(&self) -> i64 {
        self.released.iter().map(|(_, qty)| qty).sum()
    }
}

#[fx_plus(
    child(P, unwrap(or_else(LedgerError, crate::stockroom::provider_gone("reconciler")))),
    sync,
    rc
)]
pub struct Reconciler<P>
where
    P: StoreProvider, {}

impl<P> Reconciler<P>
where
    P: StoreProvider,
{
    /// Set every record's reserved counter to the sum of the quantities active orders still have to ship from it, and
    /// make each active line hold exactly its outstanding quantity.
    #[instrument(level = "debug", skip_all)]
    pub async fn resync(&self, performed_by: Option<&str>) -> Result<ResyncReport> {
        let provider = self.parent()?;
        let config = provider.ledger_config();
        let attribution = Attribution::new(config.actor_or_default(performed_by)).because("Reservation resync");

        let report = with_retries(&config, "resync", || self.try_resync(&provider, &attribution)).await?;

        if report.realigned > 0 {
            info!("Resync realigned the held amount of {} active order line(s)", report.realigned);
        }
        if report.corrected.is_empty() {
            info!("Resync checked {} record(s), nothing to correct", report.checked);
        }
        else {
            info!(
                "Resync checked {} record(s), corrected {}",
                report.checked,
                report.corrected.len()
            );
        }
        for key in &report.orphaned {
            warn!("Active order lines claim stock of {key} which has no inventory record");
        }
        Ok(report)
    }

    async fn try_resync(&self, provider: &P, attribution: &Attribution) -> Result<ResyncReport> {
        let inventory = provider.inventory()?;
        let txn = provider.db_connection().begin().await?;

        let records = InventoryRecords::find()
            .order_by_asc(inventory_record::Column::ProductId)
            .order_by_asc(inventory_record::Column::Variant)
            .lock_exclusive()
            .all(&txn)
            .await?;
        let lines = active_lines(&txn).await?;
        let mut claims = claims_of(&lines);

        let mut report = ResyncReport {
            checked: records.len(),
            ..Default::default()
        };
        for (line, outstanding) in &lines {
            if line.reserved_quantity != *outstanding {
                set_line_held(&txn, line, *outstanding).await?;
                report.realigned += 1;
            }
        }
        for record in records {
            let key = record.key();
            let held = claims.remove(&key).unwrap_or(0);
            if record.reserved_quantity != held {
                inventory.set_reserved(&txn, &key, held, attribution).await?;
                report.corrected.push(ReservedCorrection {
                    key,
                    previous: record.reserved_quantity,
                    new: held,
                });
            }
        }
        report.orphaned = claims.into_keys().collect();
        report.orphaned.sort();

        txn.commit().await?;
        Ok(report)
    }

    /// Give back reservations a delivered order left on the ledger, as far as no active order claims them. Across all
    /// repairs of the same order, no more than the order's quantity is released from a record.
    #[instrument(level = "debug", skip(self, performed_by))]
    pub async fn fix_delivery_drift(&self, order_id: Uuid, performed_by: Option<&str>) -> Result<DriftRepair> {
        let provider = self.parent()?;
        let config = provider.ledger_config();
        let actor = config.actor_or_default(performed_by);

        let repair = with_retries(&config, "fix delivery drift", || {
            self.try_fix_delivery_drift(&provider, order_id, &actor)
        })
        .await?;

        if repair.released.is_empty() {
            info!("Order {}: no delivery drift", repair.order_number);
        }
        else {
            info!(
                "Order {}: released {} unit(s) left reserved after delivery",
                repair.order_number,
                repair.total_released()
            );
        }
        Ok(repair)
    }

    async fn try_fix_delivery_drift(&self, provider: &P, order_id: Uuid, actor: &str) -> Result<DriftRepair> {
        let inventory = provider.inventory()?;
        let txn = provider.db_connection().begin().await?;

        let order = lock_order(&txn, order_id).await?;
        if order.status != OrderStatus::Delivered {
            return Err(LedgerError::Validation(format!(
                "order {} is {}, only delivered orders can be repaired",
                order.order_number, order.status
            )));
        }
        let attribution = Attribution::new(actor)
            .with_reference(&order.order_number)
            .because(DRIFT_REASON);

        let items = order_lines(&txn, order_id).await?;
        inventory
            .lock_keys(&txn, items.iter().map(OrderItem::stock_key))
            .await?;
        let claims = claims_of(&active_lines(&txn).await?);

        // Per record, the order's quantity less what earlier repairs of this order already gave back.
        let mut budget: BTreeMap<StockKey, i64> = BTreeMap::new();
        for item in &items {
            *budget.entry(item.stock_key()).or_insert(0) += item.quantity;
        }
        for entry in earlier_repairs(&txn, &order.order_number).await? {
            if let Some(left) = budget.get_mut(&StockKey::new(entry.product_id, entry.variant)) {
                *left -= entry.quantity;
            }
        }

        let mut released = Vec::new();
        for (key, left) in budget {
            let record = inventory.lock(&txn, &key).await?;
            let unclaimed = (record.reserved_quantity - claims.get(&key).copied().unwrap_or(0)).max(0);
            let amount = unclaimed.min(left);
            if amount > 0 {
                let applied = inventory.release(&txn, &key, amount, &attribution).await?;
                released.push((key, applied.quantity));
            }
        }
        for item in items.iter().filter(|i| i.reserved_quantity != 0) {
            set_line_held(&txn, item, 0).await?;
        }

        txn.commit().await?;
        Ok(DriftRepair {
            order_number: order.order_number,
            released,
        })
    }
}

impl<P> Debug for Reconciler<P>
where
    P: StoreProvider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reconciler")
    }
}

/// Lines of active orders, each with the quantity it still has to ship.
async fn active_lines(txn: &DatabaseTransaction) -> Result<Vec<(OrderItem, i64)>> {
    Ok(OrderItems::find()
        .join(JoinType::InnerJoin, order_item::Relation::Order.def())
        .filter(order::Column::Status.is_in(OrderStatus::ACTIVE))
        .all(txn)
        .await?
        .into_iter()
        .map(|line| {
            let outstanding = (line.quantity - line.shipped_quantity).max(0);
            (line, outstanding)
        })
        .collect())
}

fn claims_of(lines: &[(OrderItem, i64)]) -> HashMap<StockKey, i64> {
    let mut claims = HashMap::new();
    for (line, outstanding) in lines.iter().filter(|(_, o)| *o > 0) {
        *claims.entry(line.stock_key()).or_insert(0) += outstanding;
    }
    claims
}

async fn set_line_held(txn: &DatabaseTransaction, line: &OrderItem, held: i64) -> Result<()> {
    order_item::ActiveModel {
        order_id: Unchanged(line.order_id),
        position: Unchanged(line.position),
        reserved_quantity: Set(held),
        ..Default::default()
    }
    .update(txn)
    .await?;
    Ok(())
}

/// Releases recorded by earlier drift repairs of the order.
async fn earlier_repairs(txn: &DatabaseTransaction, order_number: &str) -> Result<Vec<HistoryEntry>> {
    Ok(InventoryHistory::find()
        .filter(inventory_history::Column::Reference.eq(order_number))
        .filter(inventory_history::Column::Kind.eq(HistoryKind::Release))
        .filter(inventory_history::Column::Reason.eq(DRIFT_REASON))
        .all(txn)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_total() {
        let repair = DriftRepair {
            order_number: "ORD-1-ABCDEF".into(),
            released:     vec![(StockKey::new(1, "M"), 2), (StockKey::product(4), 3)],
        };
        assert_eq!(repair.total_released(), 5);
    }

    fn line(position: i32, size: Option<&str>, quantity: i64, shipped: i64) -> OrderItem {
        OrderItem {
            order_id: Uuid::nil(),
            position,
            product_id: 7,
            title: "Wool Socks".into(),
            price: 9.5,
            quantity,
            size: size.map(str::to_string),
            color: None,
            reserved_quantity: 0,
            shipped_quantity: shipped,
        }
    }

    #[test]
    fn test_claims_count_outstanding_quantity() {
        let lines: Vec<(OrderItem, i64)> = [line(0, None, 4, 0), line(1, Some("M"), 2, 0), line(2, None, 3, 3)]
            .into_iter()
            .map(|l| {
                let outstanding = l.quantity - l.shipped_quantity;
                (l, outstanding)
            })
            .collect();
        let claims = claims_of(&lines);
        assert_eq!(claims.get(&StockKey::product(7)), Some(&4));
        assert_eq!(claims.get(&StockKey::new(7, "M")), Some(&2));
        assert_eq!(claims.len(), 2);
    }
}
