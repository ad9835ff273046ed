use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One replicated master action and its aggregate outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub user_id: i64,
    pub master_account_id: i64,
    #[serde(default)]
    pub master_account_name: String,
    pub symbol: String,
    pub side: i32,
    pub volume: i64,
    pub leverage: i32,
    pub action: String,
    pub sent_at: Option<DateTime<Utc>>,
    /// processing | completed | partial | failed
    pub status: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub details: Vec<TradeDetail>,
}

/// Per-slave outcome row of a trade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeDetail {
    pub id: i64,
    pub trade_id: i64,
    pub account_id: i64,
    #[serde(default)]
    pub account_name: String,
    /// success | failed
    pub status: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub order_id: String,
    pub latency_ms: i64,
}

/// Append-only activity log entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: i64,
    pub user_id: Option<i64>,
    /// info | warn | error
    pub level: String,
    pub action: String,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
}
