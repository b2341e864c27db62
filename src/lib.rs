//! # stockroom
//!
//! Order-lifecycle-driven inventory reservation for e-commerce backends.
//!
//! Stock is reserved when an order is placed, consumed when it ships, released when it is cancelled, and put back
//! when a shipped order is reversed. Every movement is recorded in an append-only history, and every order operation
//! commits or rolls back as a whole.
//!
//! # The Basics
//!
//! Each product, or each size variant of a product, has an inventory record with two counters:
//!
//! - the physical **stock** in the warehouse;
//! - the **reserved** quantity promised to orders which have not shipped yet.
//!
//! The **available** quantity is `stock - reserved`, and the inventory status (`in_stock`, `low_stock`,
//! `out_of_stock`) is derived from it and the record's low-stock threshold. Neither is ever set directly: every
//! mutation recomputes them as its last step.
//!
//! Orders go through `pending → confirmed → processing → shipped → delivered`, and can be `cancelled`. What each
//! status change does to the counters is decided by [`transition::plan`]:
//!
//! | change | effect |
//! | ------ | ------ |
//! | order placed | reserve every line |
//! | any → shipped | stock and reservation drop by the line quantity |
//! | shipped → delivered | release whatever reservation is left (normally nothing) |
//! | pending, confirmed, processing → cancelled | release the reservation |
//! | shipped, delivered → cancelled | shipped units return to stock |
//!
//! Order lines remember how much of the reservation they hold and how many of their units are out of the warehouse.
//! This is what makes the delivery cleanup safe to repeat and lets a reversal return exactly what left.
//!
//! # Consistency
//!
//! The services run each operation in a single database transaction. Inventory rows are locked in key order before
//! they are touched (`SELECT ... FOR UPDATE` on PostgreSQL; SQLite serializes writers on its single connection), so
//! concurrent checkouts competing for the last units never oversell. A transaction that loses a race with another one
//! is repeated a configurable number of times before the error is surfaced.
//!
//! Drift which happened anyway, through manual database edits or older code, is repaired by the [`Reconciler`].
//!
//! # Usage
//!
//! ```ignore
//! use stockroom::prelude::*;
//!
//! let driver = Arc::new(Sqlite::connect(&dir, "shop.db").await?);
//! let stockroom = Stockroom::builder()
//!     .db(driver.clone())
//!     .config(LedgerConfig::builder().build()?)
//!     .build()?;
//! stockroom.prepare().await?;
//!
//! let order = stockroom.lifecycle()?.create_order(submission, None).await?;
//! stockroom
//!     .lifecycle()?
//!     .update_order_status(order.order.id, StatusUpdate::to(OrderStatus::Shipped), Some("warehouse"))
//!     .await?;
//!
//! driver.close().await?;
//! ```

pub mod api;
#[cfg(feature = "cli")]
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod reconcile;
pub mod stockroom;
pub mod transition;
pub mod types;

#[doc(inline)]
pub use error::LedgerError;
#[doc(inline)]
pub use ledger::InventoryLedger;
#[doc(inline)]
pub use lifecycle::OrderLifecycle;
#[doc(inline)]
pub use reconcile::Reconciler;
#[doc(inline)]
pub use stockroom::Stockroom;

pub mod prelude {
    pub use crate::api::*;
    pub use crate::config::LedgerConfig;
    pub use crate::db::driver::DatabaseDriver;
    #[cfg(feature = "pg")]
    pub use crate::db::driver::pg::Pg;
    #[cfg(feature = "sqlite")]
    pub use crate::db::driver::sqlite::Sqlite;
    pub use crate::db::prelude::*;
    pub use crate::error::LedgerError;
    pub use crate::ledger::AdjustmentKind;
    pub use crate::ledger::Attribution;
    pub use crate::ledger::NewStock;
    pub use crate::stockroom::StoreProvider;
    pub use crate::types::*;
    pub use crate::Stockroom;
}
