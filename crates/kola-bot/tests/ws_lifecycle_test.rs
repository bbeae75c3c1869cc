//! WebSocket lifecycle integration tests.
//!
//! Tests the connection lifecycle:
//! - Subscription URL and mirror readiness
//! - Fatal rejections
//! - Readiness timeout and shutdown without a server

mod integration;
use integration::common::mock_ws::{MockWsServer, SYMBOL};

use kola_core::{Price, PriceType, QuoteProvider};
use kola_ws::{ConnectionConfig, ConnectionManager, ConnectionState, Mirror, ReadyPhase};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn manager(url: String) -> Arc<ConnectionManager> {
    let config = ConnectionConfig {
        url,
        symbol: SYMBOL.to_string(),
        reconnect_base_delay_ms: 50,
        ready_poll_ms: 10,
        ready_timeout_ms: 2_000,
        ..Default::default()
    };
    let mirror = Arc::new(Mirror::new(SYMBOL, "mlk_", 1000));
    Arc::new(ConnectionManager::new(config, mirror))
}

#[tokio::test]
async fn test_mirror_becomes_ready_over_websocket() {
    let server = MockWsServer::seeded(10000.0).await;
    let manager = manager(server.url());

    let runner = manager.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    let phase = manager.wait_ready().await.unwrap();
    assert_eq!(phase, ReadyPhase::ReadyMarket);
    assert_eq!(manager.state(), ConnectionState::Connected);

    let mirror = manager.mirror();
    assert_eq!(mirror.price(PriceType::LastPrice, None), Some(Price::new(dec!(10000))));
    assert_eq!(mirror.tick_size(), Some(Price::new(dec!(0.5))));
    assert_eq!(mirror.price(PriceType::MidPrice, None), Some(Price::new(dec!(10000))));

    let paths = server.paths();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].starts_with("/realtime?subscribe="));
    assert!(paths[0].contains("quote:XBTUSD"));
    assert!(paths[0].contains("instrument"));
    assert!(!paths[0].contains("execution"), "unauthenticated session subscribes account tables");

    manager.shutdown();
    let result = timeout(Duration::from_secs(2), handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))), "run should end cleanly on shutdown");
    server.shutdown().await;
}

#[tokio::test]
async fn test_rejection_is_fatal() {
    let server = MockWsServer::start(vec![json!({"status": 401, "error": "Not authorized"})]).await;
    let manager = manager(server.url());

    let result = timeout(Duration::from_secs(2), manager.run()).await;

    let err = result.expect("run should stop on a fatal frame").unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(server.connection_count(), 1, "fatal errors do not reconnect");
    server.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_server_closes() {
    let server = MockWsServer::closing(Vec::new()).await;
    let manager = manager(server.url());

    let runner = manager.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    let reconnected = timeout(Duration::from_secs(3), async {
        loop {
            if server.connection_count() >= 2 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(reconnected.is_ok(), "should reconnect after a server close");
    assert!(manager.consecutive_errors() >= 1);

    manager.shutdown();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_readiness_times_out_without_server() {
    let mut config = ConnectionConfig {
        url: "ws://127.0.0.1:59999/realtime".to_string(),
        symbol: SYMBOL.to_string(),
        reconnect_base_delay_ms: 50,
        ..Default::default()
    };
    config.ready_poll_ms = 10;
    config.ready_timeout_ms = 200;
    let manager = Arc::new(ConnectionManager::new(
        config,
        Arc::new(Mirror::new(SYMBOL, "mlk_", 1000)),
    ));

    let runner = manager.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    assert!(manager.wait_ready().await.is_err());

    manager.shutdown();
    let result = timeout(Duration::from_secs(2), handle).await;
    assert!(result.is_ok(), "run should exit during backoff once shut down");
}
