use anyhow::{anyhow, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use super::Database;
use crate::models::{Account, BrowserData};

const ACCOUNT_COLUMNS: &str = "id, user_id, name, token, mexc_uid, device_id, \
     COALESCE(cookies, '{}') AS cookies, COALESCE(user_agent, '') AS user_agent, \
     COALESCE(proxy, '') AS proxy, COALESCE(is_master, 0) AS is_master, \
     COALESCE(disabled, 0) AS disabled";

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let cookies_json: String = row.get("cookies");
    let is_master: i64 = row.get("is_master");
    let disabled: i64 = row.get("disabled");

    Ok(Account {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        token: row.get("token"),
        mexc_uid: row.get("mexc_uid"),
        device_id: row.get("device_id"),
        cookies: serde_json::from_str(&cookies_json).unwrap_or_default(),
        user_agent: row.get("user_agent"),
        proxy: row.get("proxy"),
        is_master: is_master == 1,
        disabled: disabled == 1,
    })
}

impl Database {
    pub async fn add_account(
        &self,
        user_id: i64,
        name: &str,
        data: &BrowserData,
        proxy: &str,
    ) -> Result<i64> {
        self.ensure_user(user_id).await?;

        let cookies_json = serde_json::to_string(&data.all_cookies)?;

        let result = sqlx::query(
            "INSERT INTO accounts (user_id, name, token, mexc_uid, device_id, cookies, user_agent, proxy)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(name)
        .bind(&data.uc_token)
        .bind(&data.u_id)
        .bind(&data.device_id)
        .bind(&cookies_json)
        .bind(&data.user_agent)
        .bind(proxy)
        .execute(self.pool())
        .await?;

        info!(user_id, name, "account added");

        Ok(result.last_insert_rowid())
    }

    pub async fn get_accounts(&self, user_id: i64) -> Result<Vec<Account>> {
        let query = format!(
            "SELECT {} FROM accounts WHERE user_id = ? ORDER BY id",
            ACCOUNT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(account_from_row).collect()
    }

    pub async fn get_account(&self, user_id: i64, account_id: i64) -> Result<Option<Account>> {
        let query = format!(
            "SELECT {} FROM accounts WHERE user_id = ? AND id = ? LIMIT 1",
            ACCOUNT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(account_id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn delete_account(&self, user_id: i64, account_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(account_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("account not found"));
        }

        info!(user_id, account_id, "account deleted");

        Ok(())
    }

    /// Mark one account as master, clearing the flag on every other account
    /// of the user. At most one master can exist per user.
    pub async fn set_master_account(&self, user_id: i64, account_id: i64) -> Result<()> {
        sqlx::query("UPDATE accounts SET is_master = 0 WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        let result = sqlx::query("UPDATE accounts SET is_master = 1 WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(account_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("account not found"));
        }

        info!(user_id, account_id, "master account set");

        Ok(())
    }

    pub async fn set_account_disabled(
        &self,
        user_id: i64,
        account_id: i64,
        disabled: bool,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET disabled = ? WHERE user_id = ? AND id = ?")
            .bind(disabled as i64)
            .bind(user_id)
            .bind(account_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("account not found"));
        }

        Ok(())
    }

    pub async fn get_master_account(&self, user_id: i64) -> Result<Option<Account>> {
        let query = format!(
            "SELECT {} FROM accounts WHERE user_id = ? AND is_master = 1 LIMIT 1",
            ACCOUNT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn get_slave_accounts(
        &self,
        user_id: i64,
        include_disabled: bool,
    ) -> Result<Vec<Account>> {
        let mut query = format!(
            "SELECT {} FROM accounts WHERE user_id = ? AND is_master = 0",
            ACCOUNT_COLUMNS
        );

        if !include_disabled {
            query.push_str(" AND disabled = 0");
        }

        query.push_str(" ORDER BY id");

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(account_from_row).collect()
    }
}
