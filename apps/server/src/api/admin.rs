use std::sync::Arc;

use axum::{extract::State, Json};

use btcpulse_core::scheduler::{CleanupReport, RefreshSummary};
use btcpulse_market_data::ProviderHealthReport;

use crate::error::ApiResult;
use crate::main_lib::AppState;

pub async fn force_cleanup(State(state): State<Arc<AppState>>) -> Json<CleanupReport> {
    tracing::info!("Forced cleanup requested");
    Json(state.scheduler.force_cleanup())
}

pub async fn refresh_all(State(state): State<Arc<AppState>>) -> ApiResult<Json<RefreshSummary>> {
    tracing::info!("Full refresh requested");
    let summary = state.scheduler.refresh_all().await?;
    Ok(Json(summary))
}

pub async fn reset_health(State(state): State<Arc<AppState>>) -> Json<ProviderHealthReport> {
    tracing::info!("Provider health reset requested");
    state.manager.reset_health();
    Json(state.manager.health_status())
}
