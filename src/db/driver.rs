//! Database drivers.
#[cfg(feature = "pg")]
pub mod pg;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::fmt::Debug;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::error::Result;

/// Trait for database [drivers](super::driver#modules).
///
/// A driver is created and connected by the process entry point and handed over to
/// [`Stockroom`](crate::Stockroom). Whoever connected it is responsible for [closing](DatabaseDriver::close) it.
#[async_trait]
pub trait DatabaseDriver: Debug + Sync + Send + 'static {
    /// Return driver name.
    fn name(&self) -> &'static str;
    /// Returns the database connection for the driver.
    fn connection(&self) -> DatabaseConnection;
    /// Configure the database connection parameters. See corresponding driver implementation for details.
    async fn configure(&self) -> Result<()>;
    /// Release the connection pool.
    async fn close(&self) -> Result<()> {
        self.connection().close().await?;
        Ok(())
    }
}
