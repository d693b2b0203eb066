use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{config::Config, main_lib::AppState};

mod admin;
mod market;
mod stream;

pub async fn healthz() -> &'static str {
    "ok"
}

/// Liveness probe kept at the root for load balancers.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "OK", "timestamp": Utc::now() }))
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/stats", get(market::get_stats))
        .route("/cache", get(market::get_cache))
        .route("/bitcoin/candles/{timeframe}", get(market::get_candles))
        .route("/adapters", get(market::get_adapters))
        .route("/memory", get(market::get_memory))
        .route("/events", get(stream::stream_events))
        .route("/admin/cleanup", post(admin::force_cleanup))
        .route("/admin/refresh", post(admin::refresh_all))
        .route("/admin/reset-health", post(admin::reset_health));

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(stream::ws_handler))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Keep-alive period for SSE streams.
pub(crate) const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);
