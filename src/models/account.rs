use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An enrolled MEXC account.
///
/// `(user_id, id)` is the identity; the name is unique per user. The session
/// credentials (`token`, `mexc_uid`, `device_id`, cookies) come from the
/// browser-export payload captured at enrolment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// uc_token exported from the browser session
    #[serde(default, skip_serializing)]
    pub token: String,
    /// MEXC-side user id (u_id)
    pub mexc_uid: String,
    /// Device fingerprint (deviceId)
    pub device_id: String,
    #[serde(default, skip_serializing)]
    pub cookies: HashMap<String, String>,
    #[serde(default)]
    pub user_agent: String,
    /// Optional outbound proxy URL for this account's requests
    #[serde(default)]
    pub proxy: String,
    pub is_master: bool,
    pub disabled: bool,
}

/// Browser-export payload the enrolment endpoint accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserData {
    pub uc_token: String,
    pub u_id: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "allCookies", default)]
    pub all_cookies: HashMap<String, String>,
    #[serde(rename = "userAgent", default)]
    pub user_agent: String,
}
