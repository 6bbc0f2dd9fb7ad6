//! HTTP exchange client against a local mock server (no network).

use std::time::Duration;

use httpmock::prelude::*;
use rust_decimal_macros::dec;
use serde_json::json;
use tdk_exchange::{ExchangeClient, ExchangeError, HttpExchangeClient};
use tdk_schemas::Side;

fn client(server: &MockServer, key: Option<&str>) -> HttpExchangeClient {
    HttpExchangeClient::new(
        &server.base_url(),
        key.map(str::to_string),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn my_trades_sends_cursor_and_bearer_key() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/exchange")
                .header("authorization", "Bearer test-key")
                .json_body(json!({"action": "getMyTrades", "startTime": 1_700_000_000_001i64}));
            then.status(200).json_body(json!({
                "success": true,
                "data": [
                    {"id": 1, "symbol": "BTCUSDT", "isBuyer": true, "qty": "0.1",
                     "price": "60000", "quoteQty": "6000", "commission": "0.0001",
                     "commissionAsset": "BTC", "time": 1_700_000_000_500i64},
                    {"symbol": "BTCUSDT", "isBuyer": true, "time": 1_700_000_000_600i64}
                ]
            }));
        })
        .await;

    let got = client(&server, Some("test-key"))
        .fetch_my_trades(Some(1_700_000_000_001))
        .await
        .unwrap();

    m.assert_async().await;
    assert_eq!(got.trades.len(), 1);
    assert_eq!(got.rejected.len(), 1);
    assert_eq!(got.trades[0].side, Side::Buy);
    assert_eq!(got.trades[0].quote_quantity, dec!(6000));
}

#[tokio::test]
async fn first_sync_omits_start_time() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/exchange")
                .json_body(json!({"action": "getMyTrades"}));
            then.status(200).json_body(json!({"success": true, "data": []}));
        })
        .await;

    let got = client(&server, None).fetch_my_trades(None).await.unwrap();
    m.assert_async().await;
    assert!(got.trades.is_empty());
}

#[tokio::test]
async fn api_failure_envelope_is_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/exchange");
            then.status(200)
                .json_body(json!({"success": false, "error": "upstream unavailable"}));
        })
        .await;

    let err = client(&server, None).fetch_my_trades(None).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Api(_)), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn server_error_status_is_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/exchange");
            then.status(502).body("bad gateway");
        })
        .await;

    let err = client(&server, None).fetch_orders().await.unwrap_err();
    match &err {
        ExchangeError::Http { status, .. } => assert_eq!(*status, 502),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn orders_are_fetched_with_get_orders_action() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/exchange")
                .json_body(json!({"action": "getOrders"}));
            then.status(200).json_body(json!({
                "success": true,
                "data": [
                    {"orderNumber": "9001", "tradeType": "BUY", "orderStatus": "1",
                     "totalPrice": "250", "asset": "USDT", "fiat": "EUR"}
                ]
            }));
        })
        .await;

    let got = client(&server, None).fetch_orders().await.unwrap();
    m.assert_async().await;
    assert_eq!(got.orders.len(), 1);
    assert_eq!(got.orders[0].order_number, "9001");
    assert_eq!(got.orders[0].raw_status, "1");
}

#[tokio::test]
async fn unreachable_exchange_is_transport_error() {
    // Port 9 (discard) on localhost is not expected to run an HTTP server.
    let c = HttpExchangeClient::new("http://127.0.0.1:9", None, Duration::from_millis(500));
    let err = c.fetch_my_trades(None).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Transport(_)), "got {err:?}");
    assert!(err.is_transient());
}
