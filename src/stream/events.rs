use serde::Deserialize;

/// Wire frame of the push stream. Control frames carry `method`, data frames
/// carry `channel` + `data`.
#[derive(Debug, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// `push.personal.order` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
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
    /// 1 open long, 2 close short, 3 open short, 4 close long
    #[serde(default)]
    pub side: i32,
    #[serde(default)]
    pub state: i32,
    #[serde(default)]
    pub deal_vol: f64,
    #[serde(default)]
    pub deal_avg_price: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub update_time: i64,

    /// Stop-order frame matched to this order within the correlation window
    #[serde(skip)]
    pub stop_order: Option<StopOrderEvent>,
}

/// `push.personal.stop.order` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOrderEvent {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub loss_trend: i32,
    #[serde(default)]
    pub profit_trend: i32,
    #[serde(default)]
    pub stop_loss_price: f64,
    #[serde(default)]
    pub take_profit_price: f64,
}

/// `push.personal.stop.planorder` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPlanOrderEvent {
    /// 0: plan order changed, 1: plan order finished (cancelled/triggered)
    #[serde(default)]
    pub is_finished: i32,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub loss_trend: i32,
    #[serde(default)]
    pub profit_trend: i32,
    #[serde(default)]
    pub stop_loss_reverse: i32,
    #[serde(default)]
    pub take_profit_reverse: i32,
    #[serde(default)]
    pub stop_loss_price: f64,
}

/// `push.personal.position` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEvent {
    #[serde(default)]
    pub position_id: i64,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub hold_vol: f64,
    /// 1 long, 2 short
    #[serde(default)]
    pub position_type: i32,
    /// 1 holding, 2 system custody, 3 closed
    #[serde(default)]
    pub state: i32,
    #[serde(default)]
    pub hold_avg_price: f64,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default)]
    pub leverage: i32,
}

/// `push.personal.order.deal` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub side: i32,
    #[serde(default)]
    pub vol: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub fee: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub is_taker: bool,
    #[serde(default)]
    pub order_id: String,
}

/// Normalised event emitted to the driver after decoding and correlation.
#[derive(Debug)]
pub enum StreamEvent {
    /// Order frame, possibly with its matched stop-order attached
    Order(OrderEvent),
    /// Stop-order frame that had no pending order to attach to
    StopOrder(StopOrderEvent),
    StopPlanOrder(StopPlanOrderEvent),
    Position(PositionEvent),
    Deal(DealEvent),
}
