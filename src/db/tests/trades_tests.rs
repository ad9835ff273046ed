use super::{browser_data, create_test_db};
use crate::models::{ActivityLog, Trade, TradeDetail};
use chrono::Utc;

#[tokio::test]
async fn test_trade_with_details() {
    let db = create_test_db().await;

    let master = db.add_account(1, "m", &browser_data("tm"), "").await.unwrap();
    let slave = db.add_account(1, "s", &browser_data("ts"), "").await.unwrap();

    let trade_id = db
        .create_trade(&Trade {
            user_id: 1,
            master_account_id: master,
            symbol: "BTC_USDT".into(),
            side: 1,
            volume: 100,
            leverage: 20,
            action: "open_position".into(),
            sent_at: Some(Utc::now()),
            status: "processing".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    db.add_trade_detail(&TradeDetail {
        trade_id,
        account_id: slave,
        status: "success".into(),
        order_id: "ORD1".into(),
        latency_ms: 42,
        ..Default::default()
    })
    .await
    .unwrap();

    db.update_trade_status(trade_id, "completed", "").await.unwrap();

    let trades = db.get_trades(1, 10, 0).await.unwrap();
    assert_eq!(trades.len(), 1);

    let trade = &trades[0];
    assert_eq!(trade.id, trade_id);
    assert_eq!(trade.symbol, "BTC_USDT");
    assert_eq!(trade.status, "completed");
    assert_eq!(trade.master_account_name, "m");
    assert_eq!(trade.details.len(), 1);
    assert_eq!(trade.details[0].account_name, "s");
    assert_eq!(trade.details[0].order_id, "ORD1");
    assert_eq!(trade.details[0].latency_ms, 42);
}

#[tokio::test]
async fn test_trade_paging() {
    let db = create_test_db().await;
    db.ensure_user(1).await.unwrap();

    for i in 0..5 {
        db.create_trade(&Trade {
            user_id: 1,
            symbol: format!("SYM{}", i),
            action: "open_position".into(),
            sent_at: Some(Utc::now()),
            status: "completed".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    }

    assert_eq!(db.get_trades(1, 2, 0).await.unwrap().len(), 2);
    assert_eq!(db.get_trades(1, 10, 4).await.unwrap().len(), 1);
    // other users see nothing
    assert!(db.get_trades(2, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_activity_log() {
    let db = create_test_db().await;
    db.ensure_user(1).await.unwrap();

    db.add_log(&ActivityLog {
        user_id: Some(1),
        level: "info".into(),
        action: "open_position".into(),
        message: "BTC_USDT LONG: 2/2 successful".into(),
        ..Default::default()
    })
    .await
    .unwrap();

    // a user-less entry is visible to everyone
    db.add_log(&ActivityLog {
        user_id: None,
        level: "warn".into(),
        action: "startup".into(),
        message: "server started".into(),
        ..Default::default()
    })
    .await
    .unwrap();

    let logs = db.get_logs(1, 10, 0).await.unwrap();
    assert_eq!(logs.len(), 2);

    let mine: Vec<_> = logs.iter().filter(|l| l.user_id == Some(1)).collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].message, "BTC_USDT LONG: 2/2 successful");
}
