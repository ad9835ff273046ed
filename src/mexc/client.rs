use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::cookie::Jar;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::sign::generate_signature;
use super::types::*;
use crate::error::CopyError;
use crate::models::Account;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Fields the master's browser stamps into request bodies. They are bound to
/// the master's session and must be stripped before re-signing for a slave.
const MASTER_SIGNATURE_FIELDS: [&str; 6] = ["p0", "k0", "chash", "mtoken", "ts", "mhash"];

/// Per-account client for the MEXC futures private API.
///
/// Each account owns its own client (cookie jar, optional proxy); clients are
/// safe for concurrent use.
pub struct MexcClient {
    account: Account,
    http: reqwest::Client,
    base_url: String,
}

impl MexcClient {
    pub fn new(account: &Account, base_url: &str) -> Result<Self, CopyError> {
        let url: Url = base_url
            .parse()
            .map_err(|e| CopyError::Internal(format!("invalid base url {}: {}", base_url, e)))?;

        let jar = Arc::new(Jar::default());
        for (name, value) in &account.cookies {
            let cookie = format!("{}={}; Path=/", name, sanitize_cookie_value(value));
            jar.add_cookie_str(&cookie, &url);
        }

        let mut builder = reqwest::Client::builder()
            .cookie_provider(jar)
            .timeout(Duration::from_secs(30));

        if !account.proxy.is_empty() {
            match reqwest::Proxy::all(&account.proxy) {
                Ok(proxy) => {
                    debug!(account = %account.name, proxy = %account.proxy, "using proxy");
                    builder = builder.proxy(proxy);
                }
                Err(e) => {
                    warn!(account = %account.name, error = %e, "invalid proxy, connecting directly");
                }
            }
        }

        Ok(Self {
            account: account.clone(),
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn apply_headers(
        &self,
        req: RequestBuilder,
        timestamp: i64,
        signature: Option<&str>,
    ) -> RequestBuilder {
        let user_agent = if self.account.user_agent.is_empty() {
            DEFAULT_USER_AGENT
        } else {
            self.account.user_agent.as_str()
        };

        let trace_id = format!("{}-{:04}", Uuid::new_v4(), timestamp % 10000);
        let sentry_trace = format!(
            "{}-{:016x}-0",
            Uuid::new_v4().simple(),
            rand::random::<u64>()
        );

        let mut req = req
            .header("Accept", "*/*")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Content-Type", "application/json")
            .header("Origin", self.base_url.as_str())
            .header("Referer", format!("{}/futures", self.base_url))
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin")
            .header("platform", "H5-web")
            .header("User-Agent", user_agent)
            .header("Authorization", self.account.token.as_str())
            .header("mtoken", self.account.device_id.as_str())
            .header("device-id", self.account.device_id.as_str())
            .header("trochilus-uid", self.account.mexc_uid.as_str())
            .header("language", "en-US")
            .header("X-Language", "en-US")
            .header("country-code", "DE")
            .header("timezone-login", "UTC+02:00")
            .header("trochilus-trace-id", trace_id)
            .header(
                "baggage",
                "sentry-environment=production,sentry-release=v5.25.11",
            )
            .header("sentry-trace", sentry_trace);

        if let Some(sig) = signature {
            req = req
                .header("x-mxc-sign", sig)
                .header("x-mxc-nonce", timestamp.to_string());
        }

        req
    }

    /// POST a pre-serialized JSON body with the per-request signature.
    async fn post_signed<T>(&self, endpoint: &str, body: String) -> Result<T, CopyError>
    where
        T: DeserializeOwned + Default,
    {
        let timestamp = Utc::now().timestamp_millis();
        let signature = generate_signature(&self.account.token, timestamp, &body);
        let url = format!("{}{}", self.base_url, endpoint);

        let req = self.http.post(&url).body(body);
        let req = self.apply_headers(req, timestamp, Some(&signature));

        let envelope: Envelope<T> = req.send().await?.json().await?;
        if !envelope.success {
            return Err(CopyError::Exchange {
                code: envelope.code,
                message: envelope.message,
            });
        }

        Ok(envelope.data.unwrap_or_default())
    }

    /// GET an endpoint (private reads are unsigned; the session headers carry auth).
    async fn get<T>(&self, path_and_query: &str) -> Result<T, CopyError>
    where
        T: DeserializeOwned + Default,
    {
        let timestamp = Utc::now().timestamp_millis();
        let url = format!("{}{}", self.base_url, path_and_query);

        let req = self.http.get(&url);
        let req = self.apply_headers(req, timestamp, None);

        let envelope: Envelope<T> = req.send().await?.json().await?;
        if !envelope.success {
            return Err(CopyError::Exchange {
                code: envelope.code,
                message: envelope.message,
            });
        }

        Ok(envelope.data.unwrap_or_default())
    }

    /// Place a market order, optionally with an attached stop-loss
    /// (pass 0.0 for none). Returns the exchange order id.
    pub async fn place_order(
        &self,
        symbol: &str,
        side: i32,
        vol: i64,
        leverage: i32,
        stop_loss_price: f64,
    ) -> Result<String, CopyError> {
        let mut order = OpenPositionRequest {
            symbol: symbol.to_string(),
            side,
            open_type: 1,
            order_type: "5".to_string(),
            vol,
            leverage,
            market_ceiling: false,
            stop_loss_price: None,
            loss_trend: None,
            price_protect: "0".to_string(),
        };

        if stop_loss_price > 0.0 {
            order.stop_loss_price = Some(format!("{:.1}", stop_loss_price));
            order.loss_trend = Some("1".to_string());
        }

        let body = serde_json::to_string(&order)?;
        let data: OrderData = self.post_signed(ORDER_CREATE_ENDPOINT, body).await?;

        debug!(account = %self.account.name, order_id = %data.order_id, "order placed");

        Ok(data.order_id)
    }

    /// Close every open position on the symbol with an opposite-side market
    /// order. The position id, leverage and volume are read back from the
    /// exchange so the close always references this account's own position.
    pub async fn close_position(&self, symbol: &str) -> Result<(), CopyError> {
        let positions = self.get_open_positions(Some(symbol)).await?;

        if positions.is_empty() {
            debug!(account = %self.account.name, symbol, "no positions to close");
            return Ok(());
        }

        for pos in positions {
            if pos.symbol != symbol || pos.hold_vol <= 0.0 {
                continue;
            }

            // positionType 2 (short) closes with side 2, long with side 4
            let close_side = if pos.position_type == 2 { 2 } else { 4 };

            let close = ClosePositionRequest {
                symbol: symbol.to_string(),
                open_type: 1,
                position_id: pos.position_id,
                leverage: pos.leverage,
                order_type: 5,
                vol: pos.hold_vol as i64,
                side: close_side,
                price_protect: "0".to_string(),
            };

            let body = serde_json::to_string(&close)?;
            let data: OrderData = self.post_signed(ORDER_CREATE_ENDPOINT, body).await?;

            debug!(
                account = %self.account.name,
                symbol,
                order_id = %data.order_id,
                "position closed"
            );
        }

        Ok(())
    }

    /// Place a stop-loss / take-profit plan order on the symbol's position.
    pub async fn place_plan_order(
        &self,
        symbol: &str,
        stop_loss_price: f64,
        take_profit_price: f64,
        loss_trend: i32,
        profit_trend: i32,
    ) -> Result<(), CopyError> {
        let req = PlanOrderRequest {
            symbol: symbol.to_string(),
            stop_loss_price: (stop_loss_price > 0.0).then_some(stop_loss_price),
            take_profit_price: (take_profit_price > 0.0).then_some(take_profit_price),
            loss_trend: (loss_trend > 0).then_some(loss_trend),
            profit_trend: (profit_trend > 0).then_some(profit_trend),
        };

        let body = serde_json::to_string(&req)?;
        self.post_signed::<serde_json::Value>(PLAN_ORDER_PLACE_ENDPOINT, body)
            .await?;

        Ok(())
    }

    pub async fn change_plan_price(&self, req: ChangePlanPriceRequest) -> Result<(), CopyError> {
        let body = serde_json::to_string(&req)?;
        self.post_signed::<serde_json::Value>(CHANGE_PLAN_PRICE_ENDPOINT, body)
            .await?;

        Ok(())
    }

    pub async fn cancel_stop_order(&self, stop_plan_order_id: i64) -> Result<(), CopyError> {
        let items = vec![StopOrderCancelItem { stop_plan_order_id }];
        let body = serde_json::to_string(&items)?;
        self.post_signed::<serde_json::Value>(STOP_ORDER_CANCEL_ENDPOINT, body)
            .await?;

        Ok(())
    }

    pub async fn get_open_stop_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<StopOrder>, CopyError> {
        let path = match symbol {
            Some(s) => format!("{}?symbol={}", STOP_ORDER_OPEN_ORDERS_ENDPOINT, s),
            None => STOP_ORDER_OPEN_ORDERS_ENDPOINT.to_string(),
        };
        self.get(&path).await
    }

    pub async fn get_open_positions(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<Position>, CopyError> {
        let path = match symbol {
            Some(s) => format!("{}?symbol={}", POSITIONS_ENDPOINT, s),
            None => POSITIONS_ENDPOINT.to_string(),
        };
        self.get(&path).await
    }

    pub async fn get_balances(&self) -> Result<Vec<Balance>, CopyError> {
        self.get(ACCOUNT_ASSETS_ENDPOINT).await
    }

    pub async fn get_leverage(&self, symbol: &str) -> Result<Vec<LeverageInfo>, CopyError> {
        let path = format!("{}?symbol={}", LEVERAGE_ENDPOINT, symbol);
        self.get(&path).await
    }

    /// Leverage this account has configured for the given open side
    /// (side 1 -> long position, side 3 -> short position).
    pub async fn get_leverage_for_side(&self, symbol: &str, side: i32) -> Result<i32, CopyError> {
        let position_type = if side == 3 { 2 } else { 1 };

        let leverages = self.get_leverage(symbol).await?;
        leverages
            .iter()
            .find(|l| l.position_type == position_type)
            .map(|l| l.leverage)
            .ok_or_else(|| {
                CopyError::Internal(format!(
                    "leverage not found for positionType {}",
                    position_type
                ))
            })
    }

    pub async fn get_open_orders(
        &self,
        page_num: u32,
        page_size: u32,
    ) -> Result<Vec<OpenOrder>, CopyError> {
        let page_num = page_num.max(1);
        let page_size = page_size.clamp(1, 100);

        let path = format!(
            "{}?page_num={}&page_size={}",
            OPEN_ORDERS_ENDPOINT, page_num, page_size
        );
        self.get(&path).await
    }

    pub async fn get_tiered_fee_rate(
        &self,
        symbol: Option<&str>,
    ) -> Result<TieredFeeRateResponse, CopyError> {
        let path = match symbol {
            Some(s) => format!("{}?symbol={}", TIERED_FEE_RATE_ENDPOINT, s),
            None => TIERED_FEE_RATE_ENDPOINT.to_string(),
        };
        self.get(&path).await
    }

    pub async fn change_leverage(&self, req: ChangeLeverageRequest) -> Result<(), CopyError> {
        let body = serde_json::to_string(&req)?;
        self.post_signed::<serde_json::Value>(CHANGE_LEVERAGE_ENDPOINT, body)
            .await?;

        Ok(())
    }

    // === Raw passthrough ===
    //
    // The browser mirror forwards the master's request bodies verbatim. These
    // variants strip the master-bound signature fields and re-sign the body
    // for this account.

    pub async fn place_order_raw(&self, body: &[u8]) -> Result<String, CopyError> {
        let body = clean_raw_request(body)?;
        let data: OrderData = self.post_signed(ORDER_CREATE_ENDPOINT, body).await?;
        Ok(data.order_id)
    }

    pub async fn place_plan_order_raw(&self, body: &[u8]) -> Result<(), CopyError> {
        let body = clean_raw_request(body)?;
        self.post_signed::<serde_json::Value>(PLAN_ORDER_PLACE_ENDPOINT, body)
            .await?;
        Ok(())
    }

    pub async fn change_plan_price_raw(&self, body: &[u8]) -> Result<(), CopyError> {
        let body = clean_raw_request(body)?;
        self.post_signed::<serde_json::Value>(CHANGE_PLAN_PRICE_ENDPOINT, body)
            .await?;
        Ok(())
    }

    pub async fn cancel_stop_order_raw(&self, body: &[u8]) -> Result<(), CopyError> {
        let body = clean_raw_request(body)?;
        self.post_signed::<serde_json::Value>(STOP_ORDER_CANCEL_ENDPOINT, body)
            .await?;
        Ok(())
    }

    pub async fn change_leverage_raw(&self, body: &[u8]) -> Result<(), CopyError> {
        let body = clean_raw_request(body)?;
        self.post_signed::<serde_json::Value>(CHANGE_LEVERAGE_ENDPOINT, body)
            .await?;
        Ok(())
    }
}

/// Strip the master-originated signature fields from a mirrored body.
fn clean_raw_request(body: &[u8]) -> Result<String, CopyError> {
    let mut value: serde_json::Value = serde_json::from_slice(body)?;

    if let Some(obj) = value.as_object_mut() {
        for field in MASTER_SIGNATURE_FIELDS {
            obj.remove(field);
        }
    }

    Ok(value.to_string())
}

/// Cookie values exported from the browser sometimes carry quotes or stray
/// line breaks the jar rejects.
fn sanitize_cookie_value(value: &str) -> String {
    value
        .trim_matches('"')
        .replace('"', "\\\"")
        .replace(['\n', '\r'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_cookie_value() {
        assert_eq!(sanitize_cookie_value("\"quoted\""), "quoted");
        assert_eq!(sanitize_cookie_value("in\"ner"), "in\\\"ner");
        assert_eq!(sanitize_cookie_value("line\r\nbreak"), "linebreak");
        assert_eq!(sanitize_cookie_value("plain"), "plain");
    }

    #[test]
    fn test_clean_raw_request_strips_signature_fields() {
        let body = br#"{"symbol":"BTC_USDT","side":1,"vol":10,"p0":"x","k0":"y","chash":"z","mtoken":"m","ts":123,"mhash":"h"}"#;
        let cleaned = clean_raw_request(body).unwrap();
        let value: serde_json::Value = serde_json::from_str(&cleaned).unwrap();

        let obj = value.as_object().unwrap();
        assert_eq!(obj.get("symbol").unwrap(), "BTC_USDT");
        assert_eq!(obj.get("vol").unwrap(), 10);
        for field in MASTER_SIGNATURE_FIELDS {
            assert!(!obj.contains_key(field), "{} should be stripped", field);
        }
    }

    #[test]
    fn test_clean_raw_request_rejects_garbage() {
        assert!(clean_raw_request(b"not json").is_err());
    }

    #[test]
    fn test_clean_raw_request_passes_arrays_through() {
        // stop-order cancel bodies are JSON arrays; nothing to strip
        let body = br#"[{"stopPlanOrderId":777}]"#;
        let cleaned = clean_raw_request(body).unwrap();
        assert_eq!(cleaned, r#"[{"stopPlanOrderId":777}]"#);
    }
}
