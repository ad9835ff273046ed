mod accounts;
mod activity_log;
mod stop_orders;
mod trades;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;

use crate::engine::{AccountStore, LogStore, SymbolCache, TradeStore};
use crate::error::CopyError;
use crate::models::{Account, ActivityLog, Trade, TradeDetail};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn new(database_url: &str) -> Result<Self> {
        // An in-memory sqlite database exists per connection; cap the pool at
        // one connection so every query sees the same database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        // Application users. Accounts, trades and logs are scoped to a user.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        // Enrolled MEXC accounts
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                token TEXT NOT NULL,
                mexc_uid TEXT NOT NULL,
                device_id TEXT NOT NULL,
                cookies TEXT,
                user_agent TEXT,
                proxy TEXT,
                is_master INTEGER DEFAULT 0,
                disabled INTEGER DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, name),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_accounts_master ON accounts(user_id, is_master)",
        )
        .execute(&pool)
        .await?;

        // One row per replicated master action
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                master_account_id INTEGER,
                symbol TEXT NOT NULL DEFAULT '',
                side INTEGER NOT NULL DEFAULT 0,
                volume INTEGER NOT NULL DEFAULT 0,
                leverage INTEGER NOT NULL DEFAULT 0,
                action TEXT NOT NULL DEFAULT '',
                sent_at DATETIME NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (master_account_id) REFERENCES accounts(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id)")
            .execute(&pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_sent ON trades(sent_at DESC)")
            .execute(&pool)
            .await?;

        // One row per slave account in a trade
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_details (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trade_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                order_id TEXT,
                latency_ms INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (trade_id) REFERENCES trades(id) ON DELETE CASCADE,
                FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_trade_details_trade ON trade_details(trade_id)",
        )
        .execute(&pool)
        .await?;

        // Append-only activity log
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                level TEXT NOT NULL,
                action TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_activity_log_user ON activity_log(user_id)",
        )
        .execute(&pool)
        .await?;

        // (user_id, order_id) -> symbol cache for master stop orders
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS master_stop_orders (
                user_id INTEGER NOT NULL,
                order_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, order_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Create the user row if it does not exist yet. Called lazily on first
    /// account enrolment so foreign keys always resolve.
    pub async fn ensure_user(&self, user_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO users (id, username) VALUES (?, ?)")
            .bind(user_id)
            .bind(format!("user_{}", user_id))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// The engine consumes the database through its capability interfaces.

#[async_trait]
impl AccountStore for Database {
    async fn get_master_account(&self, user_id: i64) -> Result<Option<Account>, CopyError> {
        Database::get_master_account(self, user_id)
            .await
            .map_err(CopyError::from)
    }

    async fn get_slave_accounts(
        &self,
        user_id: i64,
        include_disabled: bool,
    ) -> Result<Vec<Account>, CopyError> {
        Database::get_slave_accounts(self, user_id, include_disabled)
            .await
            .map_err(CopyError::from)
    }
}

#[async_trait]
impl TradeStore for Database {
    async fn create_trade(&self, trade: &Trade) -> Result<i64, CopyError> {
        Database::create_trade(self, trade)
            .await
            .map_err(CopyError::from)
    }

    async fn add_trade_detail(&self, detail: &TradeDetail) -> Result<(), CopyError> {
        Database::add_trade_detail(self, detail)
            .await
            .map_err(CopyError::from)
    }

    async fn update_trade_status(
        &self,
        trade_id: i64,
        status: &str,
        error: &str,
    ) -> Result<(), CopyError> {
        Database::update_trade_status(self, trade_id, status, error)
            .await
            .map_err(CopyError::from)
    }
}

#[async_trait]
impl LogStore for Database {
    async fn add_log(&self, log: &ActivityLog) -> Result<(), CopyError> {
        Database::add_log(self, log).await.map_err(CopyError::from)
    }
}

#[async_trait]
impl SymbolCache for Database {
    async fn get_symbol(&self, user_id: i64, order_id: &str) -> Result<Option<String>, CopyError> {
        self.get_stop_order_symbol(user_id, order_id)
            .await
            .map_err(CopyError::from)
    }

    async fn put_symbol(
        &self,
        user_id: i64,
        order_id: &str,
        symbol: &str,
    ) -> Result<(), CopyError> {
        self.save_stop_order(user_id, order_id, symbol)
            .await
            .map_err(CopyError::from)
    }

    async fn put_symbols(
        &self,
        user_id: i64,
        entries: &HashMap<String, String>,
    ) -> Result<(), CopyError> {
        self.save_stop_orders(user_id, entries)
            .await
            .map_err(CopyError::from)
    }
}
