use anyhow::Result;
use sqlx::Row;
use std::collections::HashMap;

use super::Database;

/// Persistent `(user_id, order_id) -> symbol` cache for master stop orders.
/// Lets the cancel/change paths skip the master-side open-orders lookup.
impl Database {
    pub async fn get_stop_order_symbol(
        &self,
        user_id: i64,
        order_id: &str,
    ) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT symbol FROM master_stop_orders WHERE user_id = ? AND order_id = ?",
        )
        .bind(user_id)
        .bind(order_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| r.get("symbol")))
    }

    pub async fn save_stop_order(&self, user_id: i64, order_id: &str, symbol: &str) -> Result<()> {
        self.ensure_user(user_id).await?;

        sqlx::query(
            "INSERT INTO master_stop_orders (user_id, order_id, symbol)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id, order_id) DO UPDATE SET symbol = excluded.symbol",
        )
        .bind(user_id)
        .bind(order_id)
        .bind(symbol)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Batch upsert in one transaction.
    pub async fn save_stop_orders(
        &self,
        user_id: i64,
        orders: &HashMap<String, String>,
    ) -> Result<()> {
        self.ensure_user(user_id).await?;

        let mut tx = self.pool().begin().await?;

        for (order_id, symbol) in orders {
            sqlx::query(
                "INSERT INTO master_stop_orders (user_id, order_id, symbol)
                 VALUES (?, ?, ?)
                 ON CONFLICT(user_id, order_id) DO UPDATE SET symbol = excluded.symbol",
            )
            .bind(user_id)
            .bind(order_id)
            .bind(symbol)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }
}
