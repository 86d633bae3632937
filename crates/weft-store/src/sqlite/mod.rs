use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::config::StoreConfig;
use crate::error::StoreError;

mod execution;
mod state;
mod usage;

/// SQLite-based store implementation.
///
/// Implements [`crate::ExecutionStore`], [`crate::StateStore`] and
/// [`crate::UsageLedger`] over one shared connection pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  ///
  /// The pool must have foreign key enforcement on; [`SqliteStore::connect`]
  /// takes care of that.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open a pool from `config` and run migrations.
  pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
      .create_if_missing(config.create_if_missing)
      .foreign_keys(true)
      .journal_mode(SqliteJournalMode::Wal)
      .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
      .max_connections(config.max_connections)
      .connect_with(options)
      .await?;

    let store = Self::new(pool);
    store.migrate().await?;
    info!(database_url = %config.database_url, "store ready");
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }
}
