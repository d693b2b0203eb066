use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use btcpulse_core::cache::{CacheMemoryInfo, CacheSnapshot};
use btcpulse_core::scheduler::SystemStats;
use btcpulse_market_data::{Candle, ProviderHealthReport, Timeframe};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub system: SystemStats,
    pub connected_clients: usize,
    pub server_uptime_seconds: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandlesResponse {
    pub timeframe: Timeframe,
    pub count: usize,
    pub candles: Vec<Candle>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryResponse {
    pub cache: CacheMemoryInfo,
    pub connected_clients: usize,
    pub active_timers: usize,
    pub latest_snapshot_bytes: usize,
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        system: state.scheduler.system_stats(),
        connected_clients: state.broadcaster.client_count(),
        server_uptime_seconds: Utc::now()
            .signed_duration_since(state.started_at)
            .num_seconds(),
    })
}

pub async fn get_cache(State(state): State<Arc<AppState>>) -> Json<CacheSnapshot> {
    Json(state.cache.snapshot())
}

pub async fn get_candles(
    State(state): State<Arc<AppState>>,
    Path(timeframe): Path<String>,
) -> ApiResult<Json<CandlesResponse>> {
    let timeframe = Timeframe::from_str(&timeframe).map_err(ApiError::BadRequest)?;
    let candles = state.cache.candles(timeframe);
    Ok(Json(CandlesResponse {
        timeframe,
        count: candles.len(),
        candles,
    }))
}

pub async fn get_adapters(State(state): State<Arc<AppState>>) -> Json<ProviderHealthReport> {
    Json(state.manager.health_status())
}

pub async fn get_memory(State(state): State<Arc<AppState>>) -> Json<MemoryResponse> {
    Json(MemoryResponse {
        cache: state.cache.stats().memory,
        connected_clients: state.broadcaster.client_count(),
        active_timers: state.scheduler.stats().active_timers,
        latest_snapshot_bytes: state.broadcaster.latest().map_or(0, |s| s.len()),
    })
}
