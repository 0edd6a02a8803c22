//! PostgreSQL pool backing the wallet ledger.
//!
//! The server opens one [`Database`] at startup when `DATABASE_URL` is set,
//! applies the wallet migrations and hands the pool to
//! [`PgWalletLedger`]. Without it the in-memory
//! ledger is used and no connection is made.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::{sync::Arc, time::Duration};

use crate::wallet::PgWalletLedger;

pub mod config;

pub use config::DatabaseConfig;

/// Shared handle to the wallet database.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the pool described by `config`.
    ///
    /// Pool sizing is checked before any connection is attempted; a bad
    /// config fails with [`sqlx::Error::Configuration`].
    ///
    /// ```no_run
    /// # async fn open() -> Result<(), sqlx::Error> {
    /// use bingo_engine::db::{Database, DatabaseConfig};
    ///
    /// let db = Database::new(&DatabaseConfig::new("postgres://bingo@db/wallets")).await?;
    /// db.migrate().await?;
    /// let ledger = db.wallet_ledger();
    /// # let _ = ledger;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        config
            .validate()
            .map_err(|reason| sqlx::Error::Configuration(reason.into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the wallet and journal tables if they are missing.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Ledger running on this pool.
    pub fn wallet_ledger(&self) -> PgWalletLedger {
        PgWalletLedger::new(Arc::new(self.pool.clone()))
    }

    /// Round trip used by `/health`.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
