use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::TokenRegistry;
use crate::error::CopyError;
use crate::models::Action;
use crate::session::{SessionManager, SessionMode};

/// What a mirror start hands back to the UI: the opaque token plus the
/// interceptor script with this server's URL and the token stitched in.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MirrorStart {
    pub token: String,
    pub script: String,
    pub mirror_url: String,
}

/// Mirror-mode driver. The browser-side interceptor re-posts the master's
/// own exchange calls to this server; the driver validates the opaque token,
/// parses the body into the action vocabulary, and dispatches through the
/// user's session.
pub struct MirrorDriver {
    manager: Arc<SessionManager>,
    tokens: Arc<TokenRegistry>,
    api_url: String,
}

impl MirrorDriver {
    pub fn new(manager: Arc<SessionManager>, tokens: Arc<TokenRegistry>, api_url: String) -> Self {
        Self {
            manager,
            tokens,
            api_url,
        }
    }

    pub async fn start(&self, user_id: i64, username: &str) -> Result<MirrorStart, CopyError> {
        // verifies the master account and rejects a foreign-mode session
        self.manager.start(user_id, SessionMode::Mirror).await?;

        let token = self.tokens.get_or_create(user_id, username);

        info!(user_id, username, "mirror copy trading started");

        Ok(MirrorStart {
            script: interceptor_script(&self.api_url, &token),
            mirror_url: self.api_url.clone(),
            token,
        })
    }

    /// Stop the session. The token is retained so the user can restart
    /// without the browser re-fetching the script.
    pub async fn stop(&self, user_id: i64) -> Result<(), CopyError> {
        self.manager.stop(user_id, SessionMode::Mirror).await?;

        info!(user_id, "mirror copy trading stopped");

        Ok(())
    }

    pub fn is_active(&self, user_id: i64) -> bool {
        self.manager.get(user_id, SessionMode::Mirror).is_ok()
    }

    pub fn validate_token(&self, token: &str) -> Option<(i64, String)> {
        self.tokens.validate(token)
    }

    /// Handle one intercepted request. An inactive mirror is a silent no-op:
    /// the browser script keeps posting after a stop, and that is not an
    /// error.
    pub async fn process_request(
        &self,
        token: &str,
        path: &str,
        body: &[u8],
    ) -> Result<(), CopyError> {
        let (user_id, _username) = self
            .tokens
            .validate(token)
            .ok_or(CopyError::InvalidToken)?;

        let session = match self.manager.get(user_id, SessionMode::Mirror) {
            Ok(session) => session,
            Err(_) => {
                debug!(user_id, "mirror request ignored - session not active");
                return Ok(());
            }
        };

        let action = parse_action(path, body)?;
        let result = session.dispatch(action).await?;

        info!(
            user_id,
            path,
            successes = result.success_count,
            total = result.total_count,
            "mirror request replicated"
        );

        Ok(())
    }
}

// === Body parsers ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreateBody {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    side: i32,
    #[serde(default)]
    vol: f64,
    #[serde(default)]
    leverage: i32,
    /// the exchange sends this as a string in order-create bodies
    #[serde(default)]
    stop_loss_price: Option<serde_json::Value>,
    #[serde(default)]
    position_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanOrderPlaceBody {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    stop_loss_price: f64,
    #[serde(default)]
    take_profit_price: f64,
    #[serde(default)]
    loss_trend: i32,
    #[serde(default)]
    profit_trend: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopOrderCancelBody {
    #[serde(default)]
    stop_plan_order_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePlanPriceBody {
    #[serde(default)]
    stop_plan_order_id: i64,
    #[serde(default)]
    stop_loss_price: f64,
    #[serde(default)]
    loss_trend: i32,
    #[serde(default)]
    profit_trend: i32,
    #[serde(default)]
    stop_loss_reverse: i32,
    #[serde(default)]
    take_profit_reverse: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeLeverageBody {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    leverage: i32,
    #[serde(default)]
    open_type: i32,
    #[serde(default)]
    position_type: i32,
}

fn numeric(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Parse an intercepted exchange request into the action vocabulary. The
/// path suffix picks the shape; the bodies are the exchange's own.
fn parse_action(path: &str, body: &[u8]) -> Result<Action, CopyError> {
    if path.ends_with("/order/create") {
        let raw: OrderCreateBody = serde_json::from_slice(body)?;

        return match raw.side {
            1 | 3 => Ok(Action::OpenPosition {
                symbol: raw.symbol,
                side: raw.side,
                volume: raw.vol,
                leverage: raw.leverage,
                stop_loss_price: raw.stop_loss_price.as_ref().map(numeric).unwrap_or(0.0),
            }),
            2 | 4 => Ok(Action::ClosePosition {
                symbol: raw.symbol,
                side: raw.side,
                volume: raw.vol,
                position_id: raw.position_id,
            }),
            other => Err(CopyError::Parse(format!("unknown side: {}", other))),
        };
    }

    if path.ends_with("/planorder/place") {
        let raw: PlanOrderPlaceBody = serde_json::from_slice(body)?;

        return Ok(Action::PlacePlanOrder {
            symbol: raw.symbol,
            stop_loss_price: raw.stop_loss_price,
            take_profit_price: raw.take_profit_price,
            loss_trend: raw.loss_trend,
            profit_trend: raw.profit_trend,
        });
    }

    if path.ends_with("/stoporder/cancel") {
        let raw: Vec<StopOrderCancelBody> = serde_json::from_slice(body)?;

        return Ok(Action::CancelStopOrder {
            order_ids: raw.iter().map(|r| r.stop_plan_order_id).collect(),
        });
    }

    if path.ends_with("/stoporder/change_plan_price") {
        let raw: ChangePlanPriceBody = serde_json::from_slice(body)?;

        return Ok(Action::ChangePlanPrice {
            stop_plan_order_id: raw.stop_plan_order_id,
            // no symbol in the body; the engine resolves it from the cache
            symbol: String::new(),
            stop_loss_price: raw.stop_loss_price,
            loss_trend: raw.loss_trend,
            profit_trend: raw.profit_trend,
            stop_loss_reverse: raw.stop_loss_reverse,
            take_profit_reverse: raw.take_profit_reverse,
        });
    }

    if path.ends_with("/change_leverage") {
        let raw: ChangeLeverageBody = serde_json::from_slice(body)?;

        return Ok(Action::ChangeLeverage {
            symbol: raw.symbol,
            leverage: raw.leverage,
            open_type: raw.open_type,
            position_type: raw.position_type,
        });
    }

    Err(CopyError::UnknownPath(path.to_string()))
}

/// Browser interceptor: duplicates every futures POST to this server with
/// the mirror token attached, leaving the original request untouched.
fn interceptor_script(api_url: &str, token: &str) -> String {
    const TEMPLATE: &str = r#"(function() {
    const MIRROR_BASE_URL = '__MIRROR_URL__';
    const MIRROR_TOKEN = '__MIRROR_TOKEN__';

    const originalFetch = window.fetch;

    window.fetch = async function(...args) {
        const url = args[0] instanceof Request ? args[0].url : args[0];

        if (!url.includes('mexc.com/api/platform/futures/api/v1/')) {
            return originalFetch.apply(this, args);
        }

        const options = args[1] || {};
        const method = options.method || 'GET';

        if (method !== 'POST') {
            return originalFetch.apply(this, args);
        }

        const urlObj = new URL(url);
        const mirrorFullURL = MIRROR_BASE_URL + urlObj.pathname + urlObj.search;

        const mirrorHeaders = { ...options.headers, 'X-Mirror-Token': MIRROR_TOKEN };
        const [response] = await Promise.all([
            originalFetch.apply(this, args),
            originalFetch(mirrorFullURL, {
                method: 'POST',
                headers: mirrorHeaders,
                body: options.body || null
            }).catch(err => console.warn('Mirror error:', err))
        ]);

        return response;
    };

    console.log('Mirror interceptor ready (POST only), base:', MIRROR_BASE_URL);
})();"#;

    TEMPLATE
        .replace("__MIRROR_URL__", api_url)
        .replace("__MIRROR_TOKEN__", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_create_open() {
        let body = br#"{"symbol":"BTC_USDT","side":1,"vol":100,"leverage":20,"stopLossPrice":"61000.5"}"#;
        let action = parse_action("/api/platform/futures/api/v1/private/order/create", body).unwrap();

        match action {
            Action::OpenPosition {
                symbol,
                side,
                volume,
                leverage,
                stop_loss_price,
            } => {
                assert_eq!(symbol, "BTC_USDT");
                assert_eq!(side, 1);
                assert_eq!(volume, 100.0);
                assert_eq!(leverage, 20);
                assert_eq!(stop_loss_price, 61000.5);
            }
            other => panic!("expected OpenPosition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_order_create_close() {
        let body = br#"{"symbol":"BTC_USDT","side":4,"vol":100,"positionId":42}"#;
        let action = parse_action("/order/create", body).unwrap();

        match action {
            Action::ClosePosition {
                symbol,
                side,
                position_id,
                ..
            } => {
                assert_eq!(symbol, "BTC_USDT");
                assert_eq!(side, 4);
                assert_eq!(position_id, 42);
            }
            other => panic!("expected ClosePosition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_order_create_unknown_side() {
        let body = br#"{"symbol":"BTC_USDT","side":9}"#;
        assert!(matches!(
            parse_action("/order/create", body).unwrap_err(),
            CopyError::Parse(_)
        ));
    }

    #[test]
    fn test_parse_plan_order_place() {
        let body = br#"{"symbol":"ETH_USDT","stopLossPrice":1800.0,"takeProfitPrice":2400.0,"lossTrend":1,"profitTrend":1}"#;
        let action = parse_action("/planorder/place", body).unwrap();

        match action {
            Action::PlacePlanOrder {
                symbol,
                stop_loss_price,
                take_profit_price,
                ..
            } => {
                assert_eq!(symbol, "ETH_USDT");
                assert_eq!(stop_loss_price, 1800.0);
                assert_eq!(take_profit_price, 2400.0);
            }
            other => panic!("expected PlacePlanOrder, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stop_order_cancel() {
        let body = br#"[{"stopPlanOrderId":777},{"stopPlanOrderId":888}]"#;
        let action = parse_action("/stoporder/cancel", body).unwrap();

        match action {
            Action::CancelStopOrder { order_ids } => assert_eq!(order_ids, vec![777, 888]),
            other => panic!("expected CancelStopOrder, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_change_plan_price() {
        let body = br#"{"stopPlanOrderId":555,"stopLossPrice":60000.0,"lossTrend":1,"profitTrend":1,"stopLossReverse":0,"takeProfitReverse":0}"#;
        let action = parse_action("/stoporder/change_plan_price", body).unwrap();

        match action {
            Action::ChangePlanPrice {
                stop_plan_order_id,
                symbol,
                stop_loss_price,
                ..
            } => {
                assert_eq!(stop_plan_order_id, 555);
                // the mirror body carries no symbol; resolution is the engine's job
                assert!(symbol.is_empty());
                assert_eq!(stop_loss_price, 60000.0);
            }
            other => panic!("expected ChangePlanPrice, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_change_leverage() {
        let body = br#"{"symbol":"BTC_USDT","leverage":25,"openType":1,"positionType":2}"#;
        let action = parse_action("/position/change_leverage", body).unwrap();

        match action {
            Action::ChangeLeverage {
                symbol,
                leverage,
                open_type,
                position_type,
            } => {
                assert_eq!(symbol, "BTC_USDT");
                assert_eq!(leverage, 25);
                assert_eq!(open_type, 1);
                assert_eq!(position_type, 2);
            }
            other => panic!("expected ChangeLeverage, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_path() {
        assert!(matches!(
            parse_action("/api/v1/private/order/cancel_all", b"{}").unwrap_err(),
            CopyError::UnknownPath(_)
        ));
    }

    #[test]
    fn test_parse_garbage_body() {
        assert!(matches!(
            parse_action("/order/create", b"{not json").unwrap_err(),
            CopyError::Parse(_)
        ));
    }

    #[test]
    fn test_interceptor_script_stitching() {
        let script = interceptor_script("https://copier.example.com", "abcdef0123456789");
        assert!(script.contains("const MIRROR_BASE_URL = 'https://copier.example.com';"));
        assert!(script.contains("const MIRROR_TOKEN = 'abcdef0123456789';"));
        assert!(!script.contains("__MIRROR_URL__"));
    }
}
