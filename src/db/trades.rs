use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::Database;
use crate::models::{Trade, TradeDetail};

impl Database {
    pub async fn create_trade(&self, trade: &Trade) -> Result<i64> {
        let sent_at = trade.sent_at.unwrap_or_else(Utc::now);

        let result = sqlx::query(
            "INSERT INTO trades (user_id, master_account_id, symbol, side, volume, leverage, action, sent_at, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(trade.user_id)
        .bind(trade.master_account_id)
        .bind(&trade.symbol)
        .bind(trade.side)
        .bind(trade.volume)
        .bind(trade.leverage)
        .bind(&trade.action)
        .bind(sent_at)
        .bind(&trade.status)
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update_trade_status(
        &self,
        trade_id: i64,
        status: &str,
        error: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE trades SET status = ?, error = ? WHERE id = ?")
            .bind(status)
            .bind(error)
            .bind(trade_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn add_trade_detail(&self, detail: &TradeDetail) -> Result<()> {
        sqlx::query(
            "INSERT INTO trade_details (trade_id, account_id, status, error, order_id, latency_ms)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(detail.trade_id)
        .bind(detail.account_id)
        .bind(&detail.status)
        .bind(&detail.error)
        .bind(&detail.order_id)
        .bind(detail.latency_ms)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Trade history newest-first, details attached.
    pub async fn get_trades(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            "SELECT t.id, t.user_id, COALESCE(t.master_account_id, 0) AS master_account_id,
                    COALESCE(a.name, '') AS master_name, t.symbol, t.side, t.volume, t.leverage,
                    t.action, t.sent_at, t.status, COALESCE(t.error, '') AS error
             FROM trades t
             LEFT JOIN accounts a ON t.master_account_id = a.id
             WHERE t.user_id = ?
             ORDER BY t.sent_at DESC, t.id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            let sent_at: Option<DateTime<Utc>> = row.try_get("sent_at").ok();

            let mut trade = Trade {
                id: row.get("id"),
                user_id: row.get("user_id"),
                master_account_id: row.get("master_account_id"),
                master_account_name: row.get("master_name"),
                symbol: row.get("symbol"),
                side: row.get("side"),
                volume: row.get("volume"),
                leverage: row.get("leverage"),
                action: row.get("action"),
                sent_at,
                status: row.get("status"),
                error: row.get("error"),
                details: vec![],
            };

            trade.details = self.get_trade_details(trade.id).await?;
            trades.push(trade);
        }

        Ok(trades)
    }

    pub async fn get_trade_details(&self, trade_id: i64) -> Result<Vec<TradeDetail>> {
        let rows = sqlx::query(
            "SELECT td.id, td.trade_id, td.account_id, COALESCE(a.name, '') AS account_name,
                    td.status, COALESCE(td.error, '') AS error,
                    COALESCE(td.order_id, '') AS order_id, COALESCE(td.latency_ms, 0) AS latency_ms
             FROM trade_details td
             LEFT JOIN accounts a ON td.account_id = a.id
             WHERE td.trade_id = ?
             ORDER BY td.id",
        )
        .bind(trade_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| TradeDetail {
                id: row.get("id"),
                trade_id: row.get("trade_id"),
                account_id: row.get("account_id"),
                account_name: row.get("account_name"),
                status: row.get("status"),
                error: row.get("error"),
                order_id: row.get("order_id"),
                latency_ms: row.get("latency_ms"),
            })
            .collect())
    }
}
