//! SQLite database for the local slot store.

use std::path::Path;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

use crate::types::SlotError;

/// Local SQLite database.
///
/// Only opens, migrates and hands out connections; the statements live in
/// [`super::queries`] so callers can compose them inside transactions.
#[derive(Clone)]
pub struct SlotDb {
    pool: sqlx::SqlitePool,
}

impl SlotDb {
    /// Open or create the database at the given path.
    pub async fn open(
        db_path: &Path,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, SlotError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), SlotError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS platforms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                platform_id INTEGER NOT NULL,
                email TEXT NOT NULL,
                password TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (platform_id) REFERENCES platforms(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                account_id TEXT NOT NULL,
                number INTEGER NOT NULL CHECK (number BETWEEN 1 AND 6),
                pin TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'available',
                customer TEXT,
                assigned_at TEXT,
                expires_at TEXT,
                claim TEXT,
                PRIMARY KEY (account_id, number),
                FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                password TEXT NOT NULL,
                balance INTEGER NOT NULL DEFAULT 0,
                price_tier TEXT NOT NULL DEFAULT 'retail',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS purchases (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL,
                code_hex TEXT NOT NULL,
                request_id TEXT,
                customer TEXT NOT NULL,
                platform TEXT NOT NULL,
                info TEXT NOT NULL,
                state TEXT NOT NULL,
                price INTEGER NOT NULL,
                purchased_at TEXT NOT NULL,
                account_id TEXT,
                email TEXT,
                password TEXT,
                slot_number INTEGER,
                pin TEXT,
                expires_at TEXT,
                UNIQUE (customer, request_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_platform ON accounts(platform_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_slots_state ON slots(state)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_slots_claim ON slots(claim)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_email ON customers(email COLLATE NOCASE)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_purchases_customer ON purchases(customer COLLATE NOCASE, slot_number)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Check out a pooled connection.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, SlotError> {
        Ok(self.pool.acquire().await?)
    }

    /// Start a transaction.
    ///
    /// SQLite defers locking until the first statement; callers issue a write
    /// first so the transaction holds the write lock for its whole duration.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, SlotError> {
        Ok(self.pool.begin().await?)
    }

    /// Start a transaction that already holds the write lock, for callers
    /// whose first statements are reads that decide what to write.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, SlotError> {
        let mut tx = self.pool.begin().await?;
        // A write statement takes the lock even when it matches no row.
        sqlx::query("UPDATE platforms SET name = name WHERE 0")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    #[cfg(test)]
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}
