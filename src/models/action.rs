use serde::{Deserialize, Serialize};

/// Normalised trading intent consumed by the replication engine.
///
/// Both ingest sources (push stream, browser mirror) produce exactly these
/// variants; the engine handles them exhaustively. Side codes are
/// exchange-dictated: 1 = open long, 2 = close short, 3 = open short,
/// 4 = close long.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    OpenPosition {
        symbol: String,
        side: i32,
        volume: f64,
        leverage: i32,
        /// 0 when the order carries no attached stop-loss
        stop_loss_price: f64,
    },
    ClosePosition {
        symbol: String,
        side: i32,
        volume: f64,
        /// Master-side position id; the REST adapter reads back the slave's
        /// own position and ignores this value
        position_id: i64,
    },
    PlacePlanOrder {
        symbol: String,
        stop_loss_price: f64,
        take_profit_price: f64,
        loss_trend: i32,
        profit_trend: i32,
    },
    ChangePlanPrice {
        stop_plan_order_id: i64,
        /// Symbol hint carried by push-stream frames; empty means the engine
        /// resolves it through the symbol cache
        symbol: String,
        stop_loss_price: f64,
        loss_trend: i32,
        profit_trend: i32,
        stop_loss_reverse: i32,
        take_profit_reverse: i32,
    },
    CancelStopOrder {
        order_ids: Vec<i64>,
    },
    CancelStopOrderBySymbol {
        symbol: String,
    },
    ChangeLeverage {
        symbol: String,
        leverage: i32,
        open_type: i32,
        position_type: i32,
    },
}

impl Action {
    /// Tag written into the trade record
    pub fn tag(&self) -> &'static str {
        match self {
            Action::OpenPosition { .. } => "open_position",
            Action::ClosePosition { .. } => "close_position",
            Action::PlacePlanOrder { .. } => "place_plan_order",
            Action::ChangePlanPrice { .. } => "change_plan_price",
            Action::CancelStopOrder { .. } | Action::CancelStopOrderBySymbol { .. } => {
                "cancel_stop_order"
            }
            Action::ChangeLeverage { .. } => "change_leverage",
        }
    }
}

/// side 1 and 3 open a position, 2 and 4 close one
pub fn is_open_side(side: i32) -> bool {
    side == 1 || side == 3
}

/// Human-readable side used in activity-log messages
pub fn side_text(side: i32) -> &'static str {
    match side {
        1 => "LONG",
        2 => "CLOSE SHORT",
        3 => "SHORT",
        4 => "CLOSE LONG",
        _ => "",
    }
}
