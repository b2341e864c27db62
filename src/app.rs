//! Operator command line: schema migration, reconciliation and stock maintenance.
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use fieldx::fxstruct;
use garde::Validate;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::LedgerConfig;
#[cfg(feature = "pg")]
use crate::db::driver::pg::Pg;
#[cfg(feature = "sqlite")]
use crate::db::driver::sqlite::Sqlite;
use crate::db::driver::DatabaseDriver;
use crate::error::LedgerError;
use crate::ledger::AdjustmentKind;
use crate::types::StockKey;
use crate::Stockroom;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Cannot initialize tracing: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    #[error("{0}")]
    Config(String),
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::Ledger(report.into())
    }
}

impl From<fieldx::error::FieldXError> for AppError {
    fn from(err: fieldx::error::FieldXError) -> Self {
        AppError::Ledger(err.into())
    }
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Create the schema or bring it up to date.
    Migrate,

    /// Recompute every reserved counter from the lines of active orders.
    Resync,

    /// Release reservations a delivered order left behind.
    FixDrift {
        /// Order ID.
        order_id: Uuid,
    },

    /// Change the physical stock of a product.
    Adjust {
        product_id: i32,

        /// Size variant; the base product if omitted.
        #[arg(long, default_value = "")]
        variant: String,

        /// Units to add (positive) or remove (negative).
        #[arg(allow_negative_numbers = true)]
        delta: i64,

        /// stock_in, stock_out, adjustment, damage or return.
        #[arg(long)]
        kind: AdjustmentKind,

        #[arg(long)]
        reason: String,
    },

    /// Show the inventory records of a product.
    Stock {
        product_id: i32,

        /// Show only this size variant, with its history.
        #[arg(long)]
        variant: Option<String>,
    },
}

#[derive(Debug, Clone, clap::Parser, Validate)]
#[fxstruct(no_new, get(copy))]
#[clap(about, version, author, name = "stockroom")]
pub struct Cli {
    /// Directory of the SQLite database.
    #[clap(long, env = "STOCKROOM_SQLITE_DIR", default_value = ".")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    sqlite_dir: PathBuf,

    /// File name of the SQLite database.
    #[clap(long, env = "STOCKROOM_SQLITE_DB", default_value = "stockroom.db")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    sqlite_db: String,

    /// Use PostgreSQL instead of SQLite.
    #[clap(long, env = "STOCKROOM_PG", default_value_t = false)]
    #[garde(custom(Self::feature_enabled(cfg!(feature = "pg"), "pg")))]
    pg: bool,

    #[clap(long, env = "STOCKROOM_PG_HOST", default_value = "localhost")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    pg_host: String,

    #[clap(long, env = "STOCKROOM_PG_PORT", default_value_t = 5432)]
    #[garde(skip)]
    pg_port: u16,

    #[clap(long, env = "STOCKROOM_PG_USER", default_value = "stockroom")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    pg_user: String,

    #[clap(long, env = "STOCKROOM_PG_PASSWORD", hide_env_values = true, default_value = "stockroom")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    pg_password: String,

    #[clap(long, env = "STOCKROOM_PG_DB", default_value = "stockroom")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    pg_db: String,

    /// Records registered without an explicit threshold report `low_stock` at or below this many available units.
    #[clap(long, env = "STOCKROOM_LOW_STOCK_THRESHOLD", default_value_t = 10)]
    #[garde(range(min = 0))]
    low_stock_threshold: i64,

    /// How many times a transaction is attempted when it conflicts with another one.
    #[clap(long, env = "STOCKROOM_TRANSACTION_ATTEMPTS", default_value_t = 3)]
    #[garde(range(min = 1, max = 20))]
    transaction_attempts: u32,

    /// Recorded as the author of inventory history entries.
    #[clap(long, env = "STOCKROOM_ACTOR", default_value = "cli")]
    #[fieldx(get(clone))]
    #[garde(length(min = 1))]
    actor: String,

    /// File to send log into
    #[clap(long, env = "STOCKROOM_LOG_FILE")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    #[fieldx(get(clone))]
    #[garde(skip)]
    command: Command,
}

impl Cli {
    fn feature_enabled(enabled: bool, feature: &'static str) -> impl FnOnce(&bool, &()) -> garde::Result {
        move |value, _| {
            if !*value || enabled {
                Ok(())
            }
            else {
                Err(garde::Error::new(format!("Build feature '{feature}' must be enabled.")))
            }
        }
    }

    fn ledger_config(&self) -> Result<LedgerConfig, AppError> {
        Ok(LedgerConfig::builder()
            .low_stock_threshold(self.low_stock_threshold)
            .transaction_attempts(self.transaction_attempts)
            .retry_backoff(Duration::from_millis(50))
            .default_actor(self.actor.clone())
            .build()?
            .validated()?)
    }
}

#[derive(Debug)]
pub struct StockroomApp {
    cli: Cli,
}

impl StockroomApp {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    pub fn try_from_args<I, T>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::new(Cli::try_parse_from(args)?))
    }

    pub fn cli(&self) -> &Cli {
        &self.cli
    }

    fn setup_tracing(&self) -> Result<(), AppError> {
        use std::io;
        use std::sync::Mutex;
        use tracing_subscriber::fmt::format::FmtSpan;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let dest_writer = Mutex::new(if let Some(log_file) = self.cli.log_file() {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            Box::new(file) as Box<dyn io::Write + Send>
        }
        else {
            Box::new(io::stderr()) as Box<dyn io::Write + Send>
        });

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(dest_writer)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;

        Ok(())
    }

    pub async fn execute(&self) -> Result<(), AppError> {
        let cli = &self.cli;
        cli.validate()?;
        self.setup_tracing()?;

        if cli.pg() {
            return self.execute_pg().await;
        }
        self.execute_sqlite().await
    }

    #[cfg(feature = "pg")]
    async fn execute_pg(&self) -> Result<(), AppError> {
        let cli = &self.cli;
        let driver = Pg::builder()
            .host(cli.pg_host())
            .port(cli.pg_port())
            .user(cli.pg_user())
            .password(cli.pg_password())
            .database(cli.pg_db())
            .build()?;
        driver.connect().await?;
        self.execute_with(driver).await
    }

    #[cfg(not(feature = "pg"))]
    async fn execute_pg(&self) -> Result<(), AppError> {
        Err(AppError::Config("Build feature 'pg' must be enabled.".to_string()))
    }

    #[cfg(feature = "sqlite")]
    async fn execute_sqlite(&self) -> Result<(), AppError> {
        let driver = Sqlite::connect(&self.cli.sqlite_dir(), &self.cli.sqlite_db()).await?;
        self.execute_with(Arc::new(driver)).await
    }

    #[cfg(not(feature = "sqlite"))]
    async fn execute_sqlite(&self) -> Result<(), AppError> {
        Err(AppError::Config("Build feature 'sqlite' must be enabled.".to_string()))
    }

    async fn execute_with<D: DatabaseDriver>(&self, driver: Arc<D>) -> Result<(), AppError> {
        info!("Using {} database", driver.name());
        let outcome = self.run_command(driver.clone()).await;
        // Whatever the command did, the pool is released.
        driver.close().await?;
        outcome
    }

    async fn run_command<D: DatabaseDriver>(&self, driver: Arc<D>) -> Result<(), AppError> {
        let cli = &self.cli;
        let stockroom = Stockroom::builder()
            .db(driver)
            .config(cli.ledger_config()?)
            .build()?;
        stockroom.prepare().await?;

        let actor = cli.actor();
        match cli.command() {
            Command::Migrate => {
                println!("Schema is up to date");
            }
            Command::Resync => {
                let report = stockroom.reconciler()?.resync(Some(actor.as_str())).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Command::FixDrift { order_id } => {
                let repair = stockroom
                    .reconciler()?
                    .fix_delivery_drift(order_id, Some(actor.as_str()))
                    .await?;
                println!("{}", serde_json::to_string_pretty(&repair)?);
            }
            Command::Adjust {
                product_id,
                variant,
                delta,
                kind,
                reason,
            } => {
                let applied = stockroom
                    .inventory()?
                    .manual_adjust(&StockKey::new(product_id, variant), delta, kind, &reason, Some(actor.as_str()))
                    .await?;
                println!("{}", serde_json::to_string_pretty(&applied.record)?);
            }
            Command::Stock { product_id, variant } => {
                let inventory = stockroom.inventory()?;
                match variant {
                    Some(variant) => {
                        let key = StockKey::new(product_id, variant);
                        let record = inventory.stock_level(&key).await?;
                        let history = inventory.history(&key).await?;
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&serde_json::json!({
                                "record": record,
                                "history": history,
                            }))?
                        );
                    }
                    None => {
                        let records = inventory.product_stock(product_id).await?;
                        if records.is_empty() {
                            return Err(LedgerError::product_not_found(product_id, "").into());
                        }
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn run() -> Result<(), AppError> {
        let cli = match Cli::try_parse() {
            Ok(cli) => cli,
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    err.print()?;
                    return Ok(());
                }
                _ => return Err(err.into()),
            },
        };
        Self::new(cli).execute().await
    }
}
