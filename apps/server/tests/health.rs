use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use btcpulse_market_data::{Candle, Timeframe};
use btcpulse_server::{api::app_router, build_state, config::Config, AppState};
use std::sync::Arc;

async fn app() -> (Router, Arc<AppState>) {
    let config = Config::from_env();
    let state = build_state(&config).await.unwrap();
    (app_router(state.clone(), &config), state)
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn healthz_works() {
    let (app, _state) = app().await;

    let response = app
        .oneshot(Request::builder().uri("/api/v1/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn root_health_reports_ok_with_timestamp() {
    let (app, _state) = app().await;

    let (status, body) = send(app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn cache_starts_empty_on_five_minute_timeframe() {
    let (app, _state) = app().await;

    let (status, body) = send(app, "GET", "/api/v1/cache").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentTimeframe"], "5M");
    assert!(body["currentPrice"].is_null());
    for label in ["5M", "1H", "4H", "1D", "1W"] {
        assert!(body["ohlcData"][label].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn candles_endpoint_serves_cached_series() {
    let (app, state) = app().await;
    let candles = vec![Candle {
        time: 1_700_000_400,
        open: 45_000.0,
        high: 45_200.0,
        low: 44_900.0,
        close: 45_100.0,
        volume: 3.0,
    }];
    assert!(state.cache.update_ohlc_data(Timeframe::FourHours, &candles, "binance"));

    let (status, body) = send(app, "GET", "/api/v1/bitcoin/candles/4h").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timeframe"], "4H");
    assert_eq!(body["count"], 1);
    assert_eq!(body["candles"][0]["close"], 45_100.0);
}

#[tokio::test]
async fn unknown_timeframe_is_a_bad_request() {
    let (app, _state) = app().await;

    let (status, body) = send(app, "GET", "/api/v1/bitcoin/candles/2Y").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["message"].as_str().unwrap().contains("2Y"));
}

#[tokio::test]
async fn adapters_report_lists_every_provider() {
    let (app, _state) = app().await;

    let (status, body) = send(app, "GET", "/api/v1/adapters").await;

    assert_eq!(status, StatusCode::OK);
    for id in ["coingecko", "coincap", "binance", "blockstream"] {
        assert_eq!(body["providers"][id]["healthy"], true, "{id}");
        assert_eq!(body["providers"][id]["successRate"], "0.00%", "{id}");
    }
    assert_eq!(body["providers"]["coingecko"]["rateLimitDelayMs"], 1000);
    assert!(body["priorities"]["market"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn stats_and_memory_are_available_before_start() {
    let (app, _state) = app().await;

    let (status, body) = send(app.clone(), "GET", "/api/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduler"]["isRunning"], false);
    assert_eq!(body["connectedClients"], 0);
    assert_eq!(body["cache"]["recentUpdates"].as_array().unwrap().len(), 0);

    let (status, body) = send(app, "GET", "/api/v1/memory").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache"]["historyCapacity"], 100);
}

#[tokio::test]
async fn admin_cleanup_and_health_reset() {
    let (app, _state) = app().await;

    let (status, body) = send(app.clone(), "POST", "/api/v1/admin/cleanup").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedulerCountersReset"], false);
    assert!(body["providers"]["providersReset"].as_array().unwrap().is_empty());

    let (status, body) = send(app, "POST", "/api/v1/admin/reset-health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["providers"].is_object());
}
