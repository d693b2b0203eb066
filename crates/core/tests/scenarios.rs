//! End-to-end refresh scenarios: mock providers -> manager -> scheduler -> cache -> sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use btcpulse_core::cache::SnapshotCache;
use btcpulse_core::events::{BroadcastSink, MockBroadcastSink};
use btcpulse_core::scheduler::{Scheduler, SchedulerConfig, SkipReason, TickOutcome};
use btcpulse_market_data::{
    BlockchainData, Candle, Category, FetchRequest, GlobalData, GlobalMarketData, HealthConfig,
    MarketData, MarketDataError, MarketDataProvider, ProviderCapabilities, ProviderManager,
    RateLimit, SupplyData, SupplyInfo, Timeframe,
};

const ALL_CATEGORIES: &[Category] = &[
    Category::Market,
    Category::Ohlc,
    Category::Blockchain,
    Category::Supply,
    Category::Global,
];

struct MockProvider {
    id: &'static str,
    should_fail: AtomicBool,
    calls: AtomicUsize,
    /// Every call returns a price one dollar above the previous one.
    drifting_price: bool,
    delay: Duration,
    /// Category that always fails, regardless of `should_fail`.
    broken: Option<Category>,
}

impl MockProvider {
    fn new(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            should_fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            drifting_price: false,
            delay: Duration::ZERO,
            broken: None,
        })
    }

    fn failing(id: &'static str) -> Arc<Self> {
        let provider = Self::new(id);
        provider.should_fail.store(true, Ordering::SeqCst);
        provider
    }

    fn drifting(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            should_fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            drifting_price: true,
            delay: Duration::ZERO,
            broken: None,
        })
    }

    fn drifting_except(id: &'static str, broken: Category) -> Arc<Self> {
        Arc::new(Self {
            id,
            should_fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            drifting_price: true,
            delay: Duration::ZERO,
            broken: Some(broken),
        })
    }

    fn slow(id: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            should_fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            drifting_price: false,
            delay,
            broken: None,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, category: Category) -> Result<usize, MarketDataError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail.load(Ordering::SeqCst) || self.broken == Some(category) {
            Err(MarketDataError::provider_error(self.id, "upstream exploded"))
        } else {
            Ok(call)
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            categories: ALL_CATEGORIES,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::with_min_delay(Duration::ZERO)
    }

    async fn get_market_data(&self) -> Result<MarketData, MarketDataError> {
        let call = self.enter(Category::Market).await?;
        let current_price = if self.drifting_price {
            45_000.0 + call as f64
        } else {
            45_000.0
        };
        Ok(MarketData {
            current_price,
            price_change: 2.5,
            volume: 25_000_000_000.0,
            market_cap: 850_000_000_000.0,
        })
    }

    async fn get_ohlc_data(&self, timeframe: Timeframe) -> Result<Vec<Candle>, MarketDataError> {
        self.enter(Category::Ohlc).await?;
        let start = timeframe.bucket_start(1_700_000_000);
        Ok((0..3)
            .map(|i| Candle {
                time: start + i * timeframe.bucket_seconds(),
                open: 45_000.0,
                high: 45_100.0,
                low: 44_900.0,
                close: 45_050.0,
                volume: 12.0,
            })
            .collect())
    }

    async fn get_blockchain_data(&self) -> Result<BlockchainData, MarketDataError> {
        self.enter(Category::Blockchain).await?;
        Ok(BlockchainData {
            block_height: 820_000,
        })
    }

    async fn get_supply_data(&self) -> Result<SupplyData, MarketDataError> {
        self.enter(Category::Supply).await?;
        Ok(SupplyData {
            total_supply: SupplyInfo::new(19_500_000.0, 21_000_000.0),
            extended_supply_data: None,
        })
    }

    async fn get_global_market_data(&self) -> Result<GlobalData, MarketDataError> {
        self.enter(Category::Global).await?;
        Ok(GlobalData {
            market_dominance: Some(52.4),
            global_market_data: GlobalMarketData {
                btc_dominance: Some(52.4),
                total_market_cap: Some(1.7e12),
                ..Default::default()
            },
        })
    }
}

fn manager_with(providers: &[Arc<MockProvider>]) -> Arc<ProviderManager> {
    let order: Vec<&str> = providers.iter().map(|p| p.id).collect();
    let chain: Vec<Arc<dyn MarketDataProvider>> = providers
        .iter()
        .map(|p| p.clone() as Arc<dyn MarketDataProvider>)
        .collect();
    let priorities: HashMap<Category, Vec<&str>> = Category::ALL
        .iter()
        .map(|c| (*c, order.clone()))
        .collect();
    Arc::new(ProviderManager::with_priorities(
        chain,
        &priorities,
        HealthConfig::default(),
    ))
}

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        boot_stagger: Duration::ZERO,
        broadcast_throttle: Duration::ZERO,
        ..Default::default()
    }
}

fn scheduler_with(
    providers: &[Arc<MockProvider>],
    config: SchedulerConfig,
) -> (Arc<Scheduler>, Arc<SnapshotCache>, MockBroadcastSink) {
    let cache = Arc::new(SnapshotCache::new());
    let sink = MockBroadcastSink::new();
    let scheduler = Arc::new(Scheduler::new(
        manager_with(providers),
        cache.clone(),
        Arc::new(sink.clone()) as Arc<dyn BroadcastSink>,
        config,
    ));
    (scheduler, cache, sink)
}

#[tokio::test]
async fn market_update_lands_in_cache() {
    let (scheduler, cache, sink) = scheduler_with(&[MockProvider::new("alpha")], fast_config());

    let outcome = scheduler.tick(Category::Market).await;

    assert_eq!(outcome, TickOutcome::Updated);
    let snapshot = cache.snapshot();
    assert_eq!(snapshot.current_price, Some(45_000.0));
    assert_eq!(snapshot.price_change, Some(2.5));
    assert_eq!(snapshot.volume, Some(25_000_000_000.0));
    assert_eq!(snapshot.market_cap, Some(850_000_000_000.0));
    assert_eq!(snapshot.data_source.as_deref(), Some("alpha"));
    assert_eq!(sink.len(), 1);

    // Same values again: no change, no push.
    assert_eq!(scheduler.tick(Category::Market).await, TickOutcome::Unchanged);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn ohlc_tick_rotates_timeframe_and_broadcasts_it() {
    let (scheduler, cache, sink) = scheduler_with(&[MockProvider::new("alpha")], fast_config());
    assert_eq!(scheduler.current_timeframe(), Timeframe::FiveMinutes);

    assert_eq!(scheduler.tick(Category::Ohlc).await, TickOutcome::Updated);

    assert_eq!(scheduler.current_timeframe(), Timeframe::OneHour);
    assert_eq!(cache.candles(Timeframe::OneHour).len(), 3);
    assert!(cache.candles(Timeframe::FiveMinutes).is_empty());

    let pushed = sink.last().expect("snapshot pushed");
    assert_eq!(pushed.current_timeframe, Timeframe::OneHour);
    let value = serde_json::to_value(&pushed).unwrap();
    assert_eq!(value["currentTimeframe"], json!("1H"));
}

#[tokio::test]
async fn ohlc_rotation_cycles_through_all_timeframes() {
    let (scheduler, cache, _sink) = scheduler_with(&[MockProvider::new("alpha")], fast_config());

    let mut seen = Vec::new();
    for _ in 0..5 {
        scheduler.tick(Category::Ohlc).await;
        seen.push(scheduler.current_timeframe());
    }

    assert_eq!(
        seen,
        vec![
            Timeframe::OneHour,
            Timeframe::FourHours,
            Timeframe::OneDay,
            Timeframe::OneWeek,
            Timeframe::FiveMinutes,
        ]
    );
    assert!(Timeframe::ALL.iter().all(|tf| cache.candles(*tf).len() == 3));
}

#[tokio::test]
async fn failing_primary_falls_back_to_next_provider() {
    let primary = MockProvider::failing("primary");
    let secondary = MockProvider::new("secondary");
    let manager = manager_with(&[primary.clone(), secondary.clone()]);

    let result = manager
        .fetch(FetchRequest::Ohlc(Timeframe::FiveMinutes))
        .await
        .unwrap();

    assert_eq!(result.source, "secondary");
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn scheduler_records_fallback_source() {
    let primary = MockProvider::failing("primary");
    let secondary = MockProvider::new("secondary");
    let (scheduler, cache, _sink) =
        scheduler_with(&[primary.clone(), secondary.clone()], fast_config());

    assert_eq!(scheduler.tick(Category::Ohlc).await, TickOutcome::Updated);

    assert_eq!(cache.snapshot().data_source.as_deref(), Some("secondary"));
    let stats = scheduler.stats();
    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.error_count, 0);
}

#[tokio::test]
async fn all_providers_failing_counts_an_error_and_keeps_cache() {
    let (scheduler, cache, sink) =
        scheduler_with(&[MockProvider::failing("only")], fast_config());

    assert_eq!(scheduler.tick(Category::Market).await, TickOutcome::Failed);

    assert!(cache.snapshot().current_price.is_none());
    assert!(sink.is_empty());
    let stats = scheduler.stats();
    assert_eq!(stats.error_count, 1);
    let market = &stats.categories[&Category::Market];
    assert_eq!(market.failures, 1);
    assert!(market
        .last_error
        .as_deref()
        .unwrap()
        .contains("All providers failed"));
}

#[tokio::test]
async fn string_price_payload_is_rejected_without_changes() {
    let cache = SnapshotCache::new();
    cache.update_market_data(
        &MarketData {
            current_price: 45_000.0,
            price_change: 2.5,
            volume: 25_000_000_000.0,
            market_cap: 850_000_000_000.0,
        },
        "alpha",
    );
    let before = cache.snapshot();

    let payload = json!({
        "currentPrice": "46000",
        "priceChange": 2.5,
        "volume": 25_000_000_000.0_f64,
        "marketCap": 850_000_000_000.0_f64
    });
    assert!(!cache.update_from_value(Category::Market, None, &payload, "beta"));

    assert_eq!(cache.snapshot(), before);
    assert_eq!(cache.history().len(), 1);
}

#[tokio::test]
async fn full_refresh_fills_every_category() {
    let (scheduler, cache, sink) = scheduler_with(&[MockProvider::new("alpha")], fast_config());

    let summary = scheduler.refresh_all().await.unwrap();

    assert_eq!(summary.succeeded.len(), 5);
    assert!(summary.failed.is_empty());
    assert!(summary.changed);

    let snapshot = cache.snapshot();
    assert!(snapshot.current_price.is_some());
    assert_eq!(snapshot.block_height, Some(820_000));
    assert!(snapshot.total_supply.is_some());
    assert_eq!(snapshot.market_dominance, Some(52.4));
    // Boot refresh fetches the current timeframe without rotating.
    assert_eq!(cache.candles(Timeframe::FiveMinutes).len(), 3);
    assert_eq!(scheduler.current_timeframe(), Timeframe::FiveMinutes);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn failed_categories_at_boot_wait_for_next_tick() {
    let (scheduler, cache, _sink) =
        scheduler_with(&[MockProvider::failing("only")], fast_config());

    let summary = scheduler.refresh_all().await.unwrap();

    assert_eq!(summary.failed.len(), 5);
    assert!(!summary.changed);
    assert!(cache.snapshot().current_price.is_none());
}

#[tokio::test(start_paused = true)]
async fn tick_is_skipped_while_previous_refresh_in_flight() {
    let slow = MockProvider::slow("slow", Duration::from_secs(5));
    let (scheduler, _cache, _sink) = scheduler_with(&[slow.clone()], fast_config());

    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.tick(Category::Market).await })
    };
    tokio::task::yield_now().await;

    assert_eq!(
        scheduler.tick(Category::Market).await,
        TickOutcome::Skipped(SkipReason::InFlight)
    );
    assert!(scheduler.stats().categories[&Category::Market].in_flight);

    assert_eq!(first.await.unwrap(), TickOutcome::Updated);
    assert_eq!(slow.calls(), 1);
    assert_eq!(scheduler.stats().categories[&Category::Market].skipped, 1);
    assert!(!scheduler.stats().categories[&Category::Market].in_flight);
}

#[tokio::test(start_paused = true)]
async fn broadcasts_are_throttled_with_trailing_push() {
    let config = SchedulerConfig {
        broadcast_throttle: Duration::from_secs(1),
        ..fast_config()
    };
    let (scheduler, _cache, sink) = scheduler_with(&[MockProvider::drifting("alpha")], config);

    for _ in 0..3 {
        assert_eq!(scheduler.tick(Category::Market).await, TickOutcome::Updated);
    }
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.last().unwrap().current_price, Some(45_000.0));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(sink.len(), 2);
    assert_eq!(sink.last().unwrap().current_price, Some(45_002.0));
    assert_eq!(scheduler.stats().broadcast_count, 2);
}

#[tokio::test(start_paused = true)]
async fn start_runs_boot_refresh_and_stop_ends_timers() {
    let (scheduler, cache, sink) = scheduler_with(&[MockProvider::new("alpha")], fast_config());

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(scheduler.is_running());
    assert!(cache.snapshot().current_price.is_some());
    assert_eq!(sink.len(), 1);
    assert_eq!(scheduler.stats().active_timers, 6);

    scheduler.stop().await;

    let stats = scheduler.stats();
    assert!(!stats.is_running);
    assert_eq!(stats.active_timers, 0);
}

#[tokio::test(start_paused = true)]
async fn market_timer_refreshes_on_its_interval() {
    let provider = MockProvider::drifting("alpha");
    let (scheduler, cache, _sink) = scheduler_with(&[provider.clone()], fast_config());

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let boot_calls = provider.calls();

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert!(provider.calls() > boot_calls);
    assert!(cache.snapshot().current_price.unwrap() > 45_000.0);
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failing_category_does_not_stall_other_timers() {
    let provider = MockProvider::drifting_except("alpha", Category::Blockchain);
    let (scheduler, cache, _sink) = scheduler_with(&[provider.clone()], fast_config());

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cache.snapshot().block_height.is_none());
    let boot_price = cache.snapshot().current_price.unwrap();

    // Covers four market ticks, two OHLC ticks and one blockchain tick.
    tokio::time::sleep(Duration::from_secs(125)).await;

    let stats = scheduler.stats();
    assert!(stats.is_running);
    assert_eq!(stats.active_timers, 6);

    let blockchain = &stats.categories[&Category::Blockchain];
    assert_eq!(blockchain.successes, 0);
    assert!(blockchain.failures >= 2);
    assert!(cache.snapshot().block_height.is_none());

    assert!(stats.categories[&Category::Market].successes >= 4);
    assert!(cache.snapshot().current_price.unwrap() > boot_price);
    assert!(stats.categories[&Category::Ohlc].successes >= 3);
    assert_ne!(scheduler.current_timeframe(), Timeframe::FiveMinutes);
    assert!(cache.snapshot().total_supply.is_some());

    scheduler.stop().await;
}

#[tokio::test]
async fn force_cleanup_reports_all_layers() {
    let (scheduler, _cache, _sink) = scheduler_with(&[MockProvider::new("alpha")], fast_config());
    scheduler.tick(Category::Market).await;

    let report = scheduler.force_cleanup();

    assert!(!report.scheduler_counters_reset);
    let value = serde_json::to_value(&report).unwrap();
    assert!(value.get("providers").is_some());
    assert!(value.get("cache").is_some());
}

#[tokio::test]
async fn system_stats_cover_scheduler_cache_and_providers() {
    let (scheduler, _cache, _sink) = scheduler_with(&[MockProvider::new("alpha")], fast_config());
    scheduler.tick(Category::Blockchain).await;

    let stats = scheduler.system_stats();

    assert!(stats.cache.data_availability.blockchain_data);
    assert!(stats.providers.providers.contains_key("alpha"));
    assert_eq!(stats.scheduler.categories.len(), 5);
}
