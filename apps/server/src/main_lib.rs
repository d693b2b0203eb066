use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use btcpulse_core::cache::{CacheConfig, SnapshotCache};
use btcpulse_core::events::BroadcastSink;
use btcpulse_core::scheduler::Scheduler;
use btcpulse_market_data::{default_providers, ProviderManager};

use crate::{config::Config, events::SnapshotBroadcaster};

pub struct AppState {
    pub cache: Arc<SnapshotCache>,
    pub manager: Arc<ProviderManager>,
    pub scheduler: Arc<Scheduler>,
    pub broadcaster: SnapshotBroadcaster,
    pub started_at: DateTime<Utc>,
}

pub fn init_tracing() {
    let fmt_layer = fmt::layer().json().with_current_span(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Wires providers, cache, scheduler and broadcaster together.
/// The scheduler is built but not started.
pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    config.scheduler.validate()?;

    let providers = default_providers();
    tracing::info!(
        "Registered providers: {}",
        providers
            .iter()
            .map(|p| p.id())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let manager = Arc::new(ProviderManager::new(providers));

    let cache = Arc::new(SnapshotCache::with_config(CacheConfig {
        max_history: config.history_size,
        ..Default::default()
    }));
    let broadcaster = SnapshotBroadcaster::new(config.event_buffer);
    let sink: Arc<dyn BroadcastSink> = Arc::new(broadcaster.clone());
    let scheduler = Arc::new(Scheduler::new(
        manager.clone(),
        cache.clone(),
        sink,
        config.scheduler.clone(),
    ));

    Ok(Arc::new(AppState {
        cache,
        manager,
        scheduler,
        broadcaster,
        started_at: Utc::now(),
    }))
}
