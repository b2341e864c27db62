//! Stock counters and their audit trail.
//!
//! Every mutation reads the record under an exclusive row lock, changes it in memory, recomputes the derived fields,
//! writes it back and appends a history entry, all within the transaction supplied by the caller. Callers which touch
//! several records lock them in [`StockKey`] order first, see [`InventoryLedger::lock_keys`].
use std::collections::BTreeSet;
use std::fmt::Debug;

use chrono::Utc;
use fieldx_plus::fx_plus;
use sea_orm::prelude::*;
use sea_orm::ActiveValue::NotSet;
use sea_orm::ActiveValue::Set;
use sea_orm::ActiveValue::Unchanged;
use sea_orm::DatabaseTransaction;
use sea_orm::QueryOrder;
use sea_orm::QuerySelect;
use sea_orm::TransactionTrait;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use crate::db::entity::inventory_history;
use crate::db::entity::inventory_record;
use crate::db::entity::product;
use crate::db::prelude::*;
use crate::error::LedgerError;
use crate::error::Result;
use crate::stockroom::with_retries;
use crate::stockroom::StoreProvider;
use crate::types::HistoryKind;
use crate::types::InventoryStatus;
use crate::types::StockKey;

/// Who and what a ledger movement is attributed to in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub performed_by: String,
    pub reference:    Option<String>,
    pub reason:       Option<String>,
}

impl Attribution {
    pub fn new<S: ToString>(performed_by: S) -> Self {
        Self {
            performed_by: performed_by.to_string(),
            reference:    None,
            reason:       None,
        }
    }

    pub fn with_reference<S: ToString>(mut self, reference: S) -> Self {
        self.reference = Some(reference.to_string());
        self
    }

    /// Same attribution with a different reason.
    pub fn because<S: ToString>(&self, reason: S) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..self.clone()
        }
    }
}

/// Operator adjustment kinds and the direction each of them is allowed to move the stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdjustmentKind {
    /// Goods received.
    StockIn,
    /// Goods written off outside of the order flow.
    StockOut,
    /// Count correction in either direction.
    Adjustment,
    Damage,
    /// Goods returned by a customer outside of an order cancellation.
    Return,
}

impl AdjustmentKind {
    fn history_kind(self) -> HistoryKind {
        match self {
            AdjustmentKind::StockIn => HistoryKind::StockIn,
            AdjustmentKind::StockOut => HistoryKind::StockOut,
            AdjustmentKind::Adjustment => HistoryKind::Adjustment,
            AdjustmentKind::Damage => HistoryKind::Damage,
            AdjustmentKind::Return => HistoryKind::Return,
        }
    }

    fn admits(self, delta: i64) -> bool {
        match self {
            AdjustmentKind::StockIn | AdjustmentKind::Return => delta > 0,
            AdjustmentKind::StockOut | AdjustmentKind::Damage => delta < 0,
            AdjustmentKind::Adjustment => delta != 0,
        }
    }
}

/// Effect of one operation on a record, as it goes into the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub kind:     HistoryKind,
    pub quantity: i64,
    pub previous: i64,
    pub new:      i64,
}

/// An operation asked for more than the record can give.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortage {
    pub requested: i64,
    pub available: i64,
}

/// Why the counter arithmetic refused an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Shortage(Shortage),
    /// The resulting stock would not fit the counter.
    Overflow { delta: i64 },
}

impl From<Shortage> for Rejection {
    fn from(shortage: Shortage) -> Self {
        Rejection::Shortage(shortage)
    }
}

// The counter arithmetic. Each operation leaves the record settled.
impl InventoryRecord {
    pub(crate) fn reserve(&mut self, quantity: i64) -> Result<Change, Shortage> {
        if self.available_quantity < quantity {
            return Err(Shortage {
                requested: quantity,
                available: self.available_quantity,
            });
        }
        let previous = self.reserved_quantity;
        self.reserved_quantity += quantity;
        self.settle();
        Ok(Change {
            kind: HistoryKind::Reservation,
            quantity,
            previous,
            new: self.reserved_quantity,
        })
    }

    /// Never takes the reserved counter below zero; the change reports what was actually released.
    pub(crate) fn release(&mut self, quantity: i64) -> Change {
        let previous = self.reserved_quantity;
        self.reserved_quantity = (previous - quantity).max(0);
        self.settle();
        Change {
            kind: HistoryKind::Release,
            quantity: previous - self.reserved_quantity,
            previous,
            new: self.reserved_quantity,
        }
    }

    /// Physical departure of `quantity` units, consuming up to `reservation` units of the reserved counter.
    pub(crate) fn ship_out(&mut self, quantity: i64, reservation: i64) -> Result<Change, Shortage> {
        if self.stock_quantity < quantity {
            return Err(Shortage {
                requested: quantity,
                available: self.stock_quantity,
            });
        }
        let previous = self.stock_quantity;
        self.stock_quantity -= quantity;
        self.reserved_quantity = (self.reserved_quantity - reservation.max(0)).max(0);
        self.settle();
        Ok(Change {
            kind: HistoryKind::StockOut,
            quantity,
            previous,
            new: self.stock_quantity,
        })
    }

    pub(crate) fn restock(&mut self, quantity: i64) -> Result<Change, Rejection> {
        let previous = self.stock_quantity;
        self.stock_quantity = previous
            .checked_add(quantity)
            .ok_or(Rejection::Overflow { delta: quantity })?;
        self.settle();
        Ok(Change {
            kind: HistoryKind::StockIn,
            quantity,
            previous,
            new: self.stock_quantity,
        })
    }

    pub(crate) fn adjust(&mut self, kind: HistoryKind, delta: i64) -> Result<Change, Rejection> {
        let overflow = Rejection::Overflow { delta };
        let new = self.stock_quantity.checked_add(delta).ok_or(overflow)?;
        if new < 0 {
            return Err(Shortage {
                requested: delta.checked_neg().ok_or(overflow)?,
                available: self.stock_quantity,
            }
            .into());
        }
        let quantity = delta.checked_abs().ok_or(overflow)?;
        let previous = self.stock_quantity;
        self.stock_quantity = new;
        self.settle();
        Ok(Change {
            kind,
            quantity,
            previous,
            new,
        })
    }

    /// Overwrite the reserved counter. Recorded as an adjustment of the reservation.
    pub(crate) fn set_reserved(&mut self, reserved: i64) -> Change {
        let previous = self.reserved_quantity;
        self.reserved_quantity = reserved.max(0);
        self.settle();
        Change {
            kind: HistoryKind::Adjustment,
            quantity: (self.reserved_quantity - previous).abs(),
            previous,
            new: self.reserved_quantity,
        }
    }
}

/// Outcome of a ledger movement.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub record:   InventoryRecord,
    /// Units actually moved. May be less than requested for releases.
    pub quantity: i64,
}

/// A product with its per-variant stock, for catalog registration.
#[derive(Debug, Clone)]
pub struct NewStock {
    pub variant:             String,
    pub initial_stock:       i64,
    pub low_stock_threshold: Option<i64>,
}

impl NewStock {
    pub fn new<S: ToString>(variant: S, initial_stock: i64) -> Self {
        Self {
            variant: variant.to_string(),
            initial_stock,
            low_stock_threshold: None,
        }
    }

    pub fn low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = Some(threshold);
        self
    }
}

#[fx_plus(
    child(P, unwrap(or_else(LedgerError, crate::stockroom::provider_gone("inventory ledger")))),
    sync,
    rc
)]
pub struct InventoryLedger<P>
where
    P: StoreProvider, {}

impl<P> InventoryLedger<P>
where
    P: StoreProvider,
{
    /// Lock the records of the given keys in ascending key order. Missing records are an error.
    pub async fn lock_keys<I>(&self, txn: &DatabaseTransaction, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = StockKey>,
    {
        let keys: BTreeSet<StockKey> = keys.into_iter().collect();
        for key in &keys {
            self.lock(txn, key).await?;
        }
        Ok(())
    }

    /// Read a record under an exclusive row lock.
    pub async fn lock(&self, txn: &DatabaseTransaction, key: &StockKey) -> Result<InventoryRecord> {
        InventoryRecords::find_by_id((key.product_id, key.variant.clone()))
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| LedgerError::product_not_found(key.product_id, &key.variant))
    }

    /// Move `quantity` units from available to reserved.
    pub async fn reserve(
        &self,
        txn: &DatabaseTransaction,
        key: &StockKey,
        quantity: i64,
        attribution: &Attribution,
    ) -> Result<Applied> {
        positive("reserve", quantity)?;
        self.mutate(txn, key, attribution, "Reserved for order", |rec| {
            Ok(rec.reserve(quantity)?)
        })
        .await
    }

    /// Return up to `quantity` reserved units to available.
    pub async fn release(
        &self,
        txn: &DatabaseTransaction,
        key: &StockKey,
        quantity: i64,
        attribution: &Attribution,
    ) -> Result<Applied> {
        positive("release", quantity)?;
        self.mutate(txn, key, attribution, "Reservation released", |rec| Ok(rec.release(quantity)))
            .await
    }

    /// Take `quantity` units out of the physical stock, consuming `reservation` reserved units held for them.
    pub async fn ship_out(
        &self,
        txn: &DatabaseTransaction,
        key: &StockKey,
        quantity: i64,
        reservation: i64,
        attribution: &Attribution,
    ) -> Result<Applied> {
        positive("ship", quantity)?;
        self.mutate(txn, key, attribution, "Order shipped", |rec| {
            Ok(rec.ship_out(quantity, reservation)?)
        })
        .await
    }

    /// Put `quantity` units back into the physical stock.
    pub async fn restock(
        &self,
        txn: &DatabaseTransaction,
        key: &StockKey,
        quantity: i64,
        attribution: &Attribution,
    ) -> Result<Applied> {
        positive("restock", quantity)?;
        self.mutate(txn, key, attribution, "Order cancelled after shipping", |rec| {
            rec.restock(quantity)
        })
        .await
    }

    /// Overwrite the reserved counter of a record.
    pub async fn set_reserved(
        &self,
        txn: &DatabaseTransaction,
        key: &StockKey,
        reserved: i64,
        attribution: &Attribution,
    ) -> Result<Applied> {
        self.mutate(txn, key, attribution, "Reservation resync", |rec| Ok(rec.set_reserved(reserved)))
            .await
    }

    /// Operator-driven change of the physical stock, in its own transaction.
    #[instrument(level = "debug", skip(self, reason, performed_by))]
    pub async fn manual_adjust(
        &self,
        key: &StockKey,
        delta: i64,
        kind: AdjustmentKind,
        reason: &str,
        performed_by: Option<&str>,
    ) -> Result<Applied> {
        if !kind.admits(delta) {
            return Err(LedgerError::Validation(format!(
                "{kind} cannot change stock of {key} by {delta}"
            )));
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::Validation("adjustment reason is required".to_string()));
        }

        let provider = self.parent()?;
        let config = provider.ledger_config();
        let attribution = Attribution::new(config.actor_or_default(performed_by)).because(reason);

        let applied = with_retries(&config, "manual adjustment", || async {
            let txn = provider.db_connection().begin().await?;
            let applied = self
                .mutate(&txn, key, &attribution, reason, |rec| rec.adjust(kind.history_kind(), delta))
                .await?;
            txn.commit().await?;
            Ok(applied)
        })
        .await?;

        info!(
            "{key} adjusted by {delta} ({kind}) by {}: stock {}, available {}",
            attribution.performed_by, applied.record.stock_quantity, applied.record.available_quantity
        );
        Ok(applied)
    }

    /// Add a product to the catalog along with an inventory record for each of its variants. Initial stock is recorded
    /// as a `stock_in` history entry.
    pub async fn register(
        &self,
        product: Product,
        stock: Vec<NewStock>,
        performed_by: Option<&str>,
    ) -> Result<Vec<InventoryRecord>> {
        if stock.is_empty() {
            return Err(LedgerError::Validation(format!(
                "product {} must have at least one inventory record",
                product.id
            )));
        }
        if let Some(bad) = stock.iter().find(|s| s.initial_stock < 0) {
            return Err(LedgerError::Validation(format!(
                "initial stock of product {} cannot be negative: {}",
                product.id, bad.initial_stock
            )));
        }

        let provider = self.parent()?;
        let config = provider.ledger_config();
        let attribution = Attribution::new(config.actor_or_default(performed_by)).because("Initial stock");

        let txn = provider.db_connection().begin().await?;
        let product_id = product.id;
        product::ActiveModel::from(product).insert(&txn).await?;

        let mut records = Vec::with_capacity(stock.len());
        for new_stock in stock {
            let mut record = InventoryRecord {
                product_id,
                variant: new_stock.variant,
                stock_quantity: new_stock.initial_stock,
                reserved_quantity: 0,
                available_quantity: 0,
                inventory_status: InventoryStatus::OutOfStock,
                low_stock_threshold: new_stock
                    .low_stock_threshold
                    .unwrap_or_else(|| config.low_stock_threshold()),
                updated_at: Utc::now(),
            };
            record.settle();
            let record = inventory_record::ActiveModel::from(record).insert(&txn).await?;
            if record.stock_quantity > 0 {
                let change = Change {
                    kind:     HistoryKind::StockIn,
                    quantity: record.stock_quantity,
                    previous: 0,
                    new:      record.stock_quantity,
                };
                self.append_history(&txn, &record.key(), &change, &attribution, "Initial stock")
                    .await?;
            }
            records.push(record);
        }
        txn.commit().await?;

        info!("Registered product {product_id} with {} inventory record(s)", records.len());
        Ok(records)
    }

    pub async fn stock_level(&self, key: &StockKey) -> Result<InventoryRecord> {
        InventoryRecords::find_by_id((key.product_id, key.variant.clone()))
            .one(&self.parent()?.db_connection())
            .await?
            .ok_or_else(|| LedgerError::product_not_found(key.product_id, &key.variant))
    }

    /// All records of a product, base record first.
    pub async fn product_stock(&self, product_id: i32) -> Result<Vec<InventoryRecord>> {
        Ok(InventoryRecords::find()
            .filter(inventory_record::Column::ProductId.eq(product_id))
            .order_by_asc(inventory_record::Column::Variant)
            .all(&self.parent()?.db_connection())
            .await?)
    }

    /// History of a record, oldest first.
    pub async fn history(&self, key: &StockKey) -> Result<Vec<HistoryEntry>> {
        Ok(InventoryHistory::find()
            .filter(inventory_history::Column::ProductId.eq(key.product_id))
            .filter(inventory_history::Column::Variant.eq(key.variant.as_str()))
            .order_by_asc(inventory_history::Column::Id)
            .all(&self.parent()?.db_connection())
            .await?)
    }

    async fn mutate<F>(
        &self,
        txn: &DatabaseTransaction,
        key: &StockKey,
        attribution: &Attribution,
        default_reason: &str,
        op: F,
    ) -> Result<Applied>
    where
        F: FnOnce(&mut InventoryRecord) -> Result<Change, Rejection> + Send,
    {
        let mut record = self.lock(txn, key).await?;
        let change = match op(&mut record) {
            Ok(change) => change,
            Err(Rejection::Shortage(shortage)) => return Err(self.insufficient(txn, key, shortage).await),
            Err(Rejection::Overflow { delta }) => {
                return Err(LedgerError::Validation(format!(
                    "changing stock of {key} by {delta} is out of range (stock {})",
                    record.stock_quantity
                )))
            }
        };

        let record = self.persist(txn, record).await?;
        if change.quantity != 0 {
            self.append_history(txn, key, &change, attribution, default_reason)
                .await?;
        }

        debug!(
            "{key} {}: {} -> {} (stock {}, reserved {}, available {}, {})",
            change.kind,
            change.previous,
            change.new,
            record.stock_quantity,
            record.reserved_quantity,
            record.available_quantity,
            record.inventory_status
        );

        Ok(Applied {
            record,
            quantity: change.quantity,
        })
    }

    async fn persist(&self, txn: &DatabaseTransaction, record: InventoryRecord) -> Result<InventoryRecord> {
        let am = inventory_record::ActiveModel {
            product_id:          Unchanged(record.product_id),
            variant:             Unchanged(record.variant),
            stock_quantity:      Set(record.stock_quantity),
            reserved_quantity:   Set(record.reserved_quantity),
            available_quantity:  Set(record.available_quantity),
            inventory_status:    Set(record.inventory_status),
            low_stock_threshold: Unchanged(record.low_stock_threshold),
            updated_at:          Set(Utc::now()),
        };
        Ok(am.update(txn).await?)
    }

    async fn append_history(
        &self,
        txn: &DatabaseTransaction,
        key: &StockKey,
        change: &Change,
        attribution: &Attribution,
        default_reason: &str,
    ) -> Result<HistoryEntry> {
        let entry = inventory_history::ActiveModel {
            id:                NotSet,
            product_id:        Set(key.product_id),
            variant:           Set(key.variant.clone()),
            date:              Set(Utc::now()),
            kind:              Set(change.kind),
            quantity:          Set(change.quantity),
            previous_quantity: Set(change.previous),
            new_quantity:      Set(change.new),
            reason:            Set(attribution
                .reason
                .clone()
                .unwrap_or_else(|| default_reason.to_string())),
            reference:         Set(attribution.reference.clone()),
            performed_by:      Set(attribution.performed_by.clone()),
        };
        Ok(entry.insert(txn).await?)
    }

    async fn insufficient(&self, txn: &DatabaseTransaction, key: &StockKey, shortage: Shortage) -> LedgerError {
        let title = match Products::find_by_id(key.product_id).one(txn).await {
            Ok(Some(product)) => product.title,
            _ => key.to_string(),
        };
        LedgerError::InsufficientStock {
            product_id: key.product_id,
            variant: key.variant.clone(),
            title,
            requested: shortage.requested,
            available: shortage.available,
        }
    }
}

impl<P> Debug for InventoryLedger<P>
where
    P: StoreProvider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryLedger")
    }
}

fn positive(what: &str, quantity: i64) -> Result<()> {
    if quantity <= 0 {
        return Err(LedgerError::Validation(format!(
            "cannot {what} {quantity} units, quantity must be positive"
        )));
    }
    Ok(())
}
