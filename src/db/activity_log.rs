use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::Database;
use crate::models::ActivityLog;

impl Database {
    pub async fn add_log(&self, log: &ActivityLog) -> Result<()> {
        sqlx::query("INSERT INTO activity_log (user_id, level, action, message) VALUES (?, ?, ?, ?)")
            .bind(log.user_id)
            .bind(&log.level)
            .bind(&log.action)
            .bind(&log.message)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn get_logs(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityLog>> {
        let rows = sqlx::query(
            "SELECT id, user_id, level, action, message, created_at
             FROM activity_log
             WHERE user_id = ? OR user_id IS NULL
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let created_at: Option<DateTime<Utc>> = row.try_get("created_at").ok();
                ActivityLog {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    level: row.get("level"),
                    action: row.get("action"),
                    message: row.get("message"),
                    created_at,
                }
            })
            .collect())
    }
}
