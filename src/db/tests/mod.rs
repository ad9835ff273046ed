//! Shared helpers for database tests

use crate::db::Database;
use crate::models::BrowserData;
use std::collections::HashMap;

pub(crate) async fn create_test_db() -> Database {
    Database::new("sqlite::memory:").await.unwrap()
}

pub(crate) fn browser_data(token: &str) -> BrowserData {
    BrowserData {
        uc_token: token.to_string(),
        u_id: format!("uid_{}", token),
        device_id: "device-fingerprint".to_string(),
        all_cookies: HashMap::from([("u_id".to_string(), "abc".to_string())]),
        user_agent: "Mozilla/5.0".to_string(),
    }
}

mod trades_tests;
