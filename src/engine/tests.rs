use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::Engine;
use crate::db::Database;
use crate::error::CopyError;
use crate::mexc::{
    CHANGE_LEVERAGE_ENDPOINT, CHANGE_PLAN_PRICE_ENDPOINT, LEVERAGE_ENDPOINT, ORDER_CREATE_ENDPOINT,
    PLAN_ORDER_PLACE_ENDPOINT, POSITIONS_ENDPOINT, STOP_ORDER_CANCEL_ENDPOINT,
    STOP_ORDER_OPEN_ORDERS_ENDPOINT,
};
use crate::models::{Action, BrowserData};

const MASTER_TOKEN: &str = "master-token";
const BAD_TOKEN: &str = "bad-token";

/// In-process stand-in for the exchange. Accounts are told apart by their
/// Authorization header; write calls and master-side stop-order lookups are
/// counted so tests can assert on them.
pub(crate) struct MockExchange {
    posts: AtomicUsize,
    master_lookups: AtomicUsize,
    slave_stop_orders: AtomicBool,
}

impl MockExchange {
    fn new(slave_stop_orders: bool) -> Arc<Self> {
        Arc::new(Self {
            posts: AtomicUsize::new(0),
            master_lookups: AtomicUsize::new(0),
            slave_stop_orders: AtomicBool::new(slave_stop_orders),
        })
    }

    fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    fn master_lookups(&self) -> usize {
        self.master_lookups.load(Ordering::SeqCst)
    }
}

fn auth_token(headers: &HeaderMap) -> String {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn order_create(
    State(state): State<Arc<MockExchange>>,
    headers: HeaderMap,
    _body: String,
) -> Json<Value> {
    let n = state.posts.fetch_add(1, Ordering::SeqCst);

    if auth_token(&headers) == BAD_TOKEN {
        return Json(json!({"success": false, "code": 610, "message": "insufficient margin"}));
    }

    Json(json!({"success": true, "data": {"orderId": format!("MOCK-{}", n), "ts": 0}}))
}

async fn plain_write(State(state): State<Arc<MockExchange>>, _body: String) -> Json<Value> {
    state.posts.fetch_add(1, Ordering::SeqCst);
    Json(json!({"success": true, "data": {}}))
}

async fn leverage(Query(_q): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({"success": true, "data": [
        {"positionType": 1, "leverage": 10, "openType": 1},
        {"positionType": 2, "leverage": 20, "openType": 1}
    ]}))
}

async fn open_positions(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let symbol = q.get("symbol").cloned().unwrap_or_default();
    Json(json!({"success": true, "data": [
        {"positionId": 9, "symbol": symbol, "positionType": 1, "holdVol": 100.0, "leverage": 10}
    ]}))
}

async fn open_stop_orders(
    State(state): State<Arc<MockExchange>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    if auth_token(&headers) == MASTER_TOKEN {
        state.master_lookups.fetch_add(1, Ordering::SeqCst);
        return Json(json!({"success": true, "data": [
            {"id": 888, "orderId": "M888", "symbol": "XRP_USDT", "stopLossPrice": 0.5},
            {"id": 999, "orderId": "M999", "symbol": "ADA_USDT", "stopLossPrice": 0.4}
        ]}));
    }

    if state.slave_stop_orders.load(Ordering::SeqCst) {
        let symbol = q.get("symbol").cloned().unwrap_or_default();
        return Json(json!({"success": true, "data": [
            {"id": 4321, "orderId": "S4321", "symbol": symbol, "stopLossPrice": 1.0}
        ]}));
    }

    Json(json!({"success": true, "data": []}))
}

async fn spawn_mock_exchange(state: Arc<MockExchange>) -> String {
    let app = Router::new()
        .route(ORDER_CREATE_ENDPOINT, post(order_create))
        .route(PLAN_ORDER_PLACE_ENDPOINT, post(plain_write))
        .route(STOP_ORDER_CANCEL_ENDPOINT, post(plain_write))
        .route(CHANGE_PLAN_PRICE_ENDPOINT, post(plain_write))
        .route(CHANGE_LEVERAGE_ENDPOINT, post(plain_write))
        .route(LEVERAGE_ENDPOINT, get(leverage))
        .route(POSITIONS_ENDPOINT, get(open_positions))
        .route(STOP_ORDER_OPEN_ORDERS_ENDPOINT, get(open_stop_orders))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn browser_data(token: &str) -> BrowserData {
    BrowserData {
        uc_token: token.to_string(),
        u_id: "uid".to_string(),
        device_id: "device".to_string(),
        all_cookies: HashMap::new(),
        user_agent: String::new(),
    }
}

async fn setup_db(slave_tokens: &[&str]) -> Arc<Database> {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());

    let master = db
        .add_account(1, "master", &browser_data(MASTER_TOKEN), "")
        .await
        .unwrap();
    db.set_master_account(1, master).await.unwrap();

    for (i, token) in slave_tokens.iter().enumerate() {
        db.add_account(1, &format!("slave{}", i + 1), &browser_data(token), "")
            .await
            .unwrap();
    }

    db
}

fn engine(db: &Arc<Database>, base_url: &str, dry_run: bool) -> Engine {
    Engine::new(
        db.clone(),
        db.clone(),
        db.clone(),
        db.clone(),
        base_url.to_string(),
        dry_run,
    )
}

fn open_position_action() -> Action {
    Action::OpenPosition {
        symbol: "BTC_USDT".into(),
        side: 1,
        volume: 100.0,
        leverage: 15,
        stop_loss_price: 0.0,
    }
}

#[tokio::test]
async fn test_open_position_fans_out_to_all_slaves() {
    let mock = MockExchange::new(false);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a", "t-b"]).await;
    let engine = engine(&db, &base_url, false);

    let result = engine
        .execute_action(1, open_position_action())
        .await
        .unwrap();

    assert_eq!(result.total_count, 2);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failed_count, 0);
    assert!(result.results.iter().all(|r| r.order_id.starts_with("MOCK-")));

    let trades = db.get_trades(1, 10, 0).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].action, "open_position");
    assert_eq!(trades[0].status, "completed");
    assert_eq!(trades[0].symbol, "BTC_USDT");
    assert_eq!(trades[0].side, 1);
    assert_eq!(trades[0].volume, 100);
    assert_eq!(trades[0].details.len(), 2);
    assert!(trades[0].details.iter().all(|d| d.status == "success"));

    let logs = db.get_logs(1, 10, 0).await.unwrap();
    assert!(logs
        .iter()
        .any(|l| l.message == "BTC_USDT LONG: 2/2 successful"));
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let mock = MockExchange::new(false);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a", BAD_TOKEN, "t-c"]).await;
    let engine = engine(&db, &base_url, false);

    let result = engine
        .execute_action(1, open_position_action())
        .await
        .unwrap();

    assert_eq!(result.total_count, 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failed_count, 1);

    let trades = db.get_trades(1, 10, 0).await.unwrap();
    assert_eq!(trades[0].status, "partial");

    let failed: Vec<_> = trades[0]
        .details
        .iter()
        .filter(|d| d.status == "failed")
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error.contains("610"));
    assert!(failed[0].error.contains("insufficient margin"));
}

#[tokio::test]
async fn test_disabled_slave_never_appears() {
    let mock = MockExchange::new(false);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a", "t-b"]).await;

    let slaves = db.get_slave_accounts(1, true).await.unwrap();
    let disabled_id = slaves[1].id;
    db.set_account_disabled(1, disabled_id, true).await.unwrap();

    let engine = engine(&db, &base_url, false);
    let result = engine
        .execute_action(1, open_position_action())
        .await
        .unwrap();

    assert_eq!(result.total_count, 1);

    let trades = db.get_trades(1, 10, 0).await.unwrap();
    assert_eq!(trades[0].details.len(), 1);
    assert!(trades[0].details.iter().all(|d| d.account_id != disabled_id));
}

#[tokio::test]
async fn test_master_not_set_writes_nothing() {
    let mock = MockExchange::new(false);
    let base_url = spawn_mock_exchange(mock.clone()).await;

    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    db.add_account(1, "only-slave", &browser_data("t-a"), "")
        .await
        .unwrap();

    let engine = engine(&db, &base_url, false);
    let err = engine
        .execute_action(1, open_position_action())
        .await
        .unwrap_err();

    assert!(matches!(err, CopyError::MasterNotSet));
    assert!(db.get_trades(1, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_issues_no_writes() {
    let mock = MockExchange::new(false);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a", "t-b"]).await;
    let engine = engine(&db, &base_url, true);

    let result = engine
        .execute_action(1, open_position_action())
        .await
        .unwrap();

    assert_eq!(result.success_count, 2);
    assert!(result.results.iter().all(|r| r.order_id.is_empty()));
    // reads (leverage) ran, writes did not
    assert_eq!(mock.posts(), 0);

    // the fan-out is still recorded
    let trades = db.get_trades(1, 10, 0).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].status, "completed");
}

#[tokio::test]
async fn test_close_position_reads_back_slave_position() {
    let mock = MockExchange::new(false);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a"]).await;
    let engine = engine(&db, &base_url, false);

    let result = engine
        .execute_action(
            1,
            Action::ClosePosition {
                symbol: "BTC_USDT".into(),
                side: 4,
                volume: 0.0,
                position_id: 12345,
            },
        )
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    // one close order per held position
    assert_eq!(mock.posts(), 1);

    let trades = db.get_trades(1, 10, 0).await.unwrap();
    assert_eq!(trades[0].action, "close_position");
}

#[tokio::test]
async fn test_cancel_resolves_through_cache() {
    let mock = MockExchange::new(true);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a"]).await;

    db.save_stop_order(1, "777", "SOL_USDT").await.unwrap();

    let engine = engine(&db, &base_url, false);
    let result = engine
        .execute_action(1, Action::CancelStopOrder { order_ids: vec![777] })
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    // the cache hit avoided the master-side lookup
    assert_eq!(mock.master_lookups(), 0);
    assert_eq!(mock.posts(), 1);
}

#[tokio::test]
async fn test_cancel_miss_falls_back_to_single_lookup() {
    let mock = MockExchange::new(true);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a"]).await;
    let engine = engine(&db, &base_url, false);

    let result = engine
        .execute_action(1, Action::CancelStopOrder { order_ids: vec![888] })
        .await
        .unwrap();

    assert_eq!(mock.master_lookups(), 1);
    // every entry the master returned is now cached
    assert_eq!(
        db.get_stop_order_symbol(1, "888").await.unwrap().unwrap(),
        "XRP_USDT"
    );
    assert_eq!(
        db.get_stop_order_symbol(1, "999").await.unwrap().unwrap(),
        "ADA_USDT"
    );
    // but the fan-out ran only for the requested order's symbol
    assert_eq!(result.total_count, 1);
}

#[tokio::test]
async fn test_cancel_unknown_order_fails_before_fanout() {
    let mock = MockExchange::new(true);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a"]).await;
    let engine = engine(&db, &base_url, false);

    let err = engine
        .execute_action(1, Action::CancelStopOrder { order_ids: vec![12345] })
        .await
        .unwrap_err();

    assert!(matches!(err, CopyError::OrderNotFound(12345)));
    assert!(db.get_trades(1, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_change_plan_price_no_op_without_slave_orders() {
    let mock = MockExchange::new(false);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a"]).await;
    let engine = engine(&db, &base_url, false);

    let result = engine
        .execute_action(
            1,
            Action::ChangePlanPrice {
                stop_plan_order_id: 555,
                symbol: "BTC_USDT".into(),
                stop_loss_price: 60000.0,
                loss_trend: 1,
                profit_trend: 1,
                stop_loss_reverse: 0,
                take_profit_reverse: 0,
            },
        )
        .await
        .unwrap();

    // a slave without a matching stop order is a no-op, not a failure
    assert_eq!(result.success_count, 1);
    assert_eq!(mock.posts(), 0);
}

#[tokio::test]
async fn test_change_plan_price_symbol_hint_skips_lookup() {
    let mock = MockExchange::new(true);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a"]).await;
    let engine = engine(&db, &base_url, false);

    let result = engine
        .execute_action(
            1,
            Action::ChangePlanPrice {
                stop_plan_order_id: 555,
                symbol: "ETH_USDT".into(),
                stop_loss_price: 1800.0,
                loss_trend: 1,
                profit_trend: 1,
                stop_loss_reverse: 0,
                take_profit_reverse: 0,
            },
        )
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(mock.master_lookups(), 0);
    assert_eq!(mock.posts(), 1);
}

#[tokio::test]
async fn test_open_position_with_attached_stop_loss() {
    let mock = MockExchange::new(false);
    let base_url = spawn_mock_exchange(mock.clone()).await;
    let db = setup_db(&["t-a"]).await;
    let engine = engine(&db, &base_url, false);

    let result = engine
        .execute_action(
            1,
            Action::OpenPosition {
                symbol: "ETH_USDT".into(),
                side: 1,
                volume: 50.0,
                leverage: 10,
                stop_loss_price: 1800.0,
            },
        )
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(mock.posts(), 1);
}
