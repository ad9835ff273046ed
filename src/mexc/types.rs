use serde::{Deserialize, Serialize};

// Exchange endpoint paths. The paths (not the bodies) are part of the
// contract the replication core relies on.
pub const ORDER_CREATE_ENDPOINT: &str = "/api/platform/futures/api/v1/private/order/create";
pub const POSITIONS_ENDPOINT: &str = "/api/platform/futures/api/v1/private/position/open_positions";
pub const ACCOUNT_ASSETS_ENDPOINT: &str = "/api/platform/futures/api/v1/private/account/assets";
pub const LEVERAGE_ENDPOINT: &str = "/api/platform/futures/api/v1/private/position/leverage";
pub const PLAN_ORDER_PLACE_ENDPOINT: &str = "/api/platform/futures/api/v1/private/planorder/place";
pub const STOP_ORDER_CANCEL_ENDPOINT: &str =
    "/api/platform/futures/api/v1/private/stoporder/cancel";
pub const STOP_ORDER_OPEN_ORDERS_ENDPOINT: &str =
    "/api/platform/futures/api/v1/private/stoporder/open_orders";
pub const CHANGE_PLAN_PRICE_ENDPOINT: &str =
    "/api/platform/futures/api/v1/private/stoporder/change_plan_price";
pub const OPEN_ORDERS_ENDPOINT: &str =
    "/api/platform/futures/api/v1/private/order/list/open_orders";
pub const TIERED_FEE_RATE_ENDPOINT: &str =
    "/api/platform/futures/api/v1/private/account/tiered_fee_rate/v2";
pub const CHANGE_LEVERAGE_ENDPOINT: &str =
    "/api/platform/futures/api/v1/private/position/change_leverage";

/// Response envelope every private endpoint uses.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

/// Order-create body. The exchange is picky about field types: `type` and
/// `lossTrend` are strings here but numbers elsewhere.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    pub symbol: String,
    pub side: i32,
    /// 1: isolated
    pub open_type: i32,
    /// "5": market order (string)
    #[serde(rename = "type")]
    pub order_type: String,
    pub vol: i64,
    pub leverage: i32,
    pub market_ceiling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_price: Option<String>,
    /// "1": latest price (string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_trend: Option<String>,
    pub price_protect: String,
}

/// Close body posted to the same order-create endpoint; here `type` is a
/// number.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionRequest {
    pub symbol: String,
    pub open_type: i32,
    pub position_id: i64,
    pub leverage: i32,
    /// 5: market order (number)
    #[serde(rename = "type")]
    pub order_type: i32,
    pub vol: i64,
    pub side: i32,
    pub price_protect: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub ts: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub position_id: i64,
    #[serde(default)]
    pub symbol: String,
    /// 1: long, 2: short
    #[serde(default)]
    pub position_type: i32,
    #[serde(default)]
    pub hold_vol: f64,
    #[serde(default)]
    pub hold_avg_price: f64,
    #[serde(default)]
    pub leverage: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub available_balance: f64,
    #[serde(default)]
    pub equity: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageInfo {
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub max_vol: f64,
    /// 1: long, 2: short
    #[serde(default)]
    pub position_type: i32,
    /// 1: isolated, 2: cross
    #[serde(default)]
    pub open_type: i32,
    #[serde(default)]
    pub leverage: i32,
}

/// Plan-order (SL/TP) placement body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOrderRequest {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_trend: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_trend: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOrderCancelItem {
    pub stop_plan_order_id: i64,
}

/// Open stop-order as the exchange reports it. Only the fields the core
/// consumes are modeled; the exchange sends many more.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOrder {
    /// Numeric plan-order id used in cancel/change requests
    #[serde(default)]
    pub id: i64,
    /// Originating order id (string form)
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub loss_trend: i32,
    #[serde(default)]
    pub profit_trend: i32,
    #[serde(default)]
    pub stop_loss_price: f64,
    #[serde(default)]
    pub take_profit_price: f64,
    #[serde(default)]
    pub state: i32,
    #[serde(default)]
    pub is_finished: i32,
    #[serde(default)]
    pub stop_loss_reverse: i32,
    #[serde(default)]
    pub take_profit_reverse: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanPriceRequest {
    pub stop_plan_order_id: i64,
    pub loss_trend: i32,
    pub profit_trend: i32,
    pub stop_loss_reverse: i32,
    pub take_profit_reverse: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLeverageRequest {
    pub symbol: String,
    pub leverage: i32,
    /// 1: isolated
    pub open_type: i32,
    /// 1: long, 2: short
    pub position_type: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub position_id: i64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub vol: f64,
    #[serde(default)]
    pub leverage: i32,
    #[serde(default)]
    pub side: i32,
    #[serde(default)]
    pub state: i32,
    #[serde(default)]
    pub create_time: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredFeeRate {
    #[serde(default)]
    pub tiered_deal_amount: f64,
    #[serde(default)]
    pub tiered_effective_day: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredFeeRateResponse {
    #[serde(default)]
    pub original_maker_fee: f64,
    #[serde(default)]
    pub original_taker_fee: f64,
    #[serde(default)]
    pub real_maker_fee: f64,
    #[serde(default)]
    pub real_taker_fee: f64,
    #[serde(default)]
    pub discount_rate: f64,
    #[serde(default)]
    pub deduct_rate: f64,
    #[serde(default)]
    pub deal_amount: f64,
    #[serde(default)]
    pub fee_rate_mode: String,
    #[serde(default)]
    pub tiered_fee_rates: Vec<TieredFeeRate>,
}
