//! The dependency root: owns the database driver and the configuration and hands them to the services.
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use fieldx_plus::child_build;
use fieldx_plus::fx_plus;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::config::LedgerConfig;
use crate::db::driver::DatabaseDriver;
use crate::db::migrations::Migrator;
use crate::error::ledgerr;
use crate::error::LedgerError;
use crate::error::Result;
use crate::ledger::InventoryLedger;
use crate::lifecycle::OrderLifecycle;
use crate::reconcile::Reconciler;

/// What the services need from their owner.
pub trait StoreProvider: Sized + Sync + Send + 'static {
    fn db_connection(&self) -> DatabaseConnection;
    fn ledger_config(&self) -> LedgerConfig;
    fn inventory(&self) -> Result<Arc<InventoryLedger<Self>>>;
}

// A service holds a weak reference to its provider. Losing the provider while a service is still in use can only
// happen if the service outlived the `Stockroom` it was obtained from.
#[inline(always)]
pub(crate) fn provider_gone(who: &str) -> LedgerError {
    ledgerr!("({who}) Stockroom (parent) is gone")
}

/// ```ignore
/// let driver = Arc::new(Sqlite::connect(&dir, "shop.db").await?);
/// let stockroom = Stockroom::builder()
///     .db(driver.clone())
///     .config(LedgerConfig::builder().low_stock_threshold(5).build()?)
///     .build()?;
/// stockroom.prepare().await?;
///
/// let order = stockroom.lifecycle()?.create_order(submission, Some("checkout")).await?;
///
/// driver.close().await?;
/// ```
#[fx_plus(parent, sync, rc, no_new, fallible(off, error(LedgerError)), default(off), builder(vis(pub)))]
pub struct Stockroom<D: DatabaseDriver> {
    #[fieldx(get(clone), builder(required))]
    db: Arc<D>,

    #[fieldx(get(clone), builder(required))]
    config: LedgerConfig,

    #[fieldx(lazy, fallible, get(clone), builder(off))]
    inventory: Arc<InventoryLedger<Stockroom<D>>>,

    #[fieldx(lazy, fallible, get(clone), builder(off))]
    lifecycle: Arc<OrderLifecycle<Stockroom<D>>>,

    #[fieldx(lazy, fallible, get(clone), builder(off))]
    reconciler: Arc<Reconciler<Stockroom<D>>>,
}

impl<D: DatabaseDriver> Stockroom<D> {
    fn build_inventory(&self) -> Result<Arc<InventoryLedger<Stockroom<D>>>> {
        Ok(child_build!(self, InventoryLedger<Stockroom<D>>)?)
    }

    fn build_lifecycle(&self) -> Result<Arc<OrderLifecycle<Stockroom<D>>>> {
        Ok(child_build!(self, OrderLifecycle<Stockroom<D>>)?)
    }

    fn build_reconciler(&self) -> Result<Arc<Reconciler<Stockroom<D>>>> {
        Ok(child_build!(self, Reconciler<Stockroom<D>>)?)
    }

    /// Configure the connection and bring the schema up to date.
    #[instrument(level = "debug", skip(self), fields(driver = self.db().name()))]
    pub async fn prepare(&self) -> Result<()> {
        let db = self.db();
        db.configure().await?;
        Migrator::up(&db.connection(), None).await?;
        info!("Schema is up to date");
        Ok(())
    }

    /// Drop and re-create all tables.
    pub async fn reset(&self) -> Result<()> {
        let conn = self.db().connection();
        Migrator::down(&conn, None).await?;
        Migrator::up(&conn, None).await?;
        Ok(())
    }
}

impl<D: DatabaseDriver> StoreProvider for Stockroom<D> {
    fn db_connection(&self) -> DatabaseConnection {
        self.db().connection()
    }

    fn ledger_config(&self) -> LedgerConfig {
        self.config()
    }

    fn inventory(&self) -> Result<Arc<InventoryLedger<Self>>> {
        Stockroom::inventory(self)
    }
}

impl<D: DatabaseDriver> Debug for Stockroom<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stockroom").field("driver", &self.db().name()).finish()
    }
}

/// Run a unit of work, repeating it while the datastore reports a conflict and attempts remain.
pub(crate) async fn with_retries<T, F, Fut>(config: &LedgerConfig, what: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.transaction_attempts().max(1);
    let mut tried = 0;
    loop {
        tried += 1;
        match attempt().await {
            Err(err) if err.is_retryable() && tried < attempts => {
                warn!("{what}: attempt {tried} of {attempts} aborted, retrying: {err}");
                tokio::time::sleep(config.retry_backoff() * tried).await;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;

    fn config(attempts: u32) -> LedgerConfig {
        LedgerConfig::builder()
            .transaction_attempts(attempts)
            .retry_backoff(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let calls = AtomicU32::new(0);
        let res = with_retries(&config(3), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::TransactionAbort("database is locked".into()))
            }
            else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(res.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_last_attempt() {
        let calls = AtomicU32::new(0);
        let res: Result<()> = with_retries(&config(2), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::TransactionAbort("deadlock detected".into()))
        })
        .await;
        assert!(matches!(res, Err(LedgerError::TransactionAbort(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let res: Result<()> = with_retries(&config(5), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::Validation("quantity must be positive".into()))
        })
        .await;
        assert!(matches!(res, Err(LedgerError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
