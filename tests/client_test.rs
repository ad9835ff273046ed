// Tests for the signed per-account REST adapter against the mock exchange.


use std::collections::HashMap;

use mexc_copier_server::mexc::{ChangeLeverageRequest, MexcClient};
use mexc_copier_server::models::Account;
use test_server::{spawn_mock_exchange, BAD_TOKEN};

fn account(token: &str) -> Account {
    Account {
        id: 1,
        user_id: 1,
        name: "slave1".into(),
        token: token.into(),
        mexc_uid: "uid".into(),
        device_id: "device".into(),
        cookies: HashMap::from([("u_id".into(), "\"quoted\"".into())]),
        user_agent: String::new(),
        proxy: String::new(),
        is_master: false,
        disabled: false,
    }
}

#[tokio::test]
async fn test_place_order_signs_requests() {
    let (mock, base_url) = spawn_mock_exchange().await;
    let client = MexcClient::new(&account("t-a"), &base_url).unwrap();

    // the mock rejects unsigned writes, so success proves the signature
    // headers were attached
    let order_id = client
        .place_order("BTC_USDT", 1, 100, 20, 0.0)
        .await
        .unwrap();

    assert!(order_id.starts_with("MOCK-"));
    assert_eq!(mock.posts(), 1);
}

#[tokio::test]
async fn test_exchange_error_carries_code_and_message() {
    let (_mock, base_url) = spawn_mock_exchange().await;
    let client = MexcClient::new(&account(BAD_TOKEN), &base_url).unwrap();

    let err = client
        .place_order("BTC_USDT", 1, 100, 20, 0.0)
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("610"));
    assert!(message.contains("insufficient margin"));
}

#[tokio::test]
async fn test_raw_passthrough_strips_master_fields() {
    let (_mock, base_url) = spawn_mock_exchange().await;
    let client = MexcClient::new(&account("t-a"), &base_url).unwrap();

    // a body as the master's browser sent it, signature fields included;
    // the mock fails any request in which they survive
    let body = br#"{"symbol":"BTC_USDT","side":1,"vol":100,"leverage":20,
        "p0":"x","k0":"y","chash":"z","mtoken":"m","ts":1700000000000,"mhash":"h"}"#;

    let order_id = client.place_order_raw(body).await.unwrap();
    assert!(order_id.starts_with("MOCK-"));
}

#[tokio::test]
async fn test_leverage_is_read_per_side() {
    let (_mock, base_url) = spawn_mock_exchange().await;
    let client = MexcClient::new(&account("t-a"), &base_url).unwrap();

    // the mock configures 10x long, 20x short
    assert_eq!(client.get_leverage_for_side("BTC_USDT", 1).await.unwrap(), 10);
    assert_eq!(client.get_leverage_for_side("BTC_USDT", 3).await.unwrap(), 20);
}

#[tokio::test]
async fn test_close_position_reads_back_and_closes() {
    let (mock, base_url) = spawn_mock_exchange().await;
    let client = MexcClient::new(&account("t-a"), &base_url).unwrap();

    client.close_position("ETH_USDT").await.unwrap();

    // one market close per held position reported by the exchange
    assert_eq!(mock.posts(), 1);
}

#[tokio::test]
async fn test_account_reads() {
    let (_mock, base_url) = spawn_mock_exchange().await;
    let client = MexcClient::new(&account("t-a"), &base_url).unwrap();

    let balances = client.get_balances().await.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].currency, "USDT");
    assert_eq!(balances[0].available_balance, 1234.5);

    let fees = client.get_tiered_fee_rate(None).await.unwrap();
    assert_eq!(fees.real_taker_fee, 0.0002);
    assert_eq!(fees.tiered_fee_rates.len(), 1);

    let orders = client.get_open_orders(0, 500).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, "OPEN-1");
}

#[tokio::test]
async fn test_change_leverage() {
    let (mock, base_url) = spawn_mock_exchange().await;
    let client = MexcClient::new(&account("t-a"), &base_url).unwrap();

    client
        .change_leverage(ChangeLeverageRequest {
            symbol: "BTC_USDT".into(),
            leverage: 25,
            open_type: 1,
            position_type: 2,
        })
        .await
        .unwrap();

    assert_eq!(mock.posts(), 1);
}
