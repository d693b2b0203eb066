use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use btcpulse_market_data::{Category, FetchRequest, ProviderManager, Timeframe};

use super::in_flight::InFlightSet;
use super::scheduler_model::{
    CategoryStats, CleanupReport, RefreshSummary, SchedulerConfig, SchedulerStats, SkipReason,
    SystemStats, TickOutcome,
};
use crate::cache::SnapshotCache;
use crate::errors::{Error, Result};
use crate::events::BroadcastSink;

#[derive(Default)]
struct ThrottleState {
    last_push: Option<Instant>,
    last_push_at: Option<DateTime<Utc>>,
    trailing_scheduled: bool,
}

/// Holds the "full refresh running" flag for as long as it lives.
struct UpdatingFlag<'a>(&'a AtomicBool);

impl<'a> UpdatingFlag<'a> {
    fn try_set(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for UpdatingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Scheduler {} lock was poisoned, recovering", name);
        poisoned.into_inner()
    })
}

fn request_for(category: Category, timeframe: Timeframe) -> FetchRequest {
    match category {
        Category::Market => FetchRequest::Market,
        Category::Ohlc => FetchRequest::Ohlc(timeframe),
        Category::Blockchain => FetchRequest::Blockchain,
        Category::Supply => FetchRequest::Supply,
        Category::Global => FetchRequest::Global,
    }
}

/// Drives per-category refreshes and pushes merged snapshots.
///
/// Always used behind an `Arc`: timer loops and the trailing broadcast
/// hold their own handle to the scheduler.
///
/// - Each category runs on its own interval. A tick is skipped while the
///   previous refresh of that category, or a full refresh, is still running.
/// - OHLC ticks move to the next timeframe before fetching, so the five
///   timeframes are refreshed round-robin.
/// - Snapshot pushes are throttled. A change inside the throttle window
///   schedules one trailing push so the latest state always goes out.
pub struct Scheduler {
    manager: Arc<ProviderManager>,
    cache: Arc<SnapshotCache>,
    sink: Arc<dyn BroadcastSink>,
    config: SchedulerConfig,
    current_timeframe: Mutex<Timeframe>,
    running: AtomicBool,
    updating: AtomicBool,
    in_flight: InFlightSet,
    success_count: AtomicU64,
    error_count: AtomicU64,
    broadcast_count: AtomicU64,
    category_stats: Mutex<HashMap<Category, CategoryStats>>,
    throttle: Mutex<ThrottleState>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        manager: Arc<ProviderManager>,
        cache: Arc<SnapshotCache>,
        sink: Arc<dyn BroadcastSink>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let current_timeframe = cache.current_timeframe();
        Self {
            manager,
            cache,
            sink,
            config,
            current_timeframe: Mutex::new(current_timeframe),
            running: AtomicBool::new(false),
            updating: AtomicBool::new(false),
            in_flight: InFlightSet::new(),
            success_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            broadcast_count: AtomicU64::new(0),
            category_stats: Mutex::new(HashMap::new()),
            throttle: Mutex::new(ThrottleState::default()),
            started_at: Mutex::new(None),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn manager(&self) -> &Arc<ProviderManager> {
        &self.manager
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    /// Timeframe of the most recent OHLC tick.
    pub fn current_timeframe(&self) -> Timeframe {
        *lock(&self.current_timeframe, "timeframe")
    }

    /// Runs a full refresh, then starts the per-category timers and the
    /// maintenance loop. Returns immediately; the work happens on spawned
    /// tasks. Calling it on a running scheduler is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("Scheduler already running");
            return;
        }
        self.shutdown.send_replace(false);
        *lock(&self.started_at, "start time") = Some(Utc::now());
        info!(
            "Starting scheduler (market {}s, ohlc {}s, blockchain {}s, supply {}s, global {}s)",
            self.config.market_interval.as_secs(),
            self.config.ohlc_interval.as_secs(),
            self.config.blockchain_interval.as_secs(),
            self.config.supply_interval.as_secs(),
            self.config.global_interval.as_secs()
        );

        let this = Arc::clone(self);
        let boot = tokio::spawn(async move {
            match this.refresh_all().await {
                Ok(summary) => info!(
                    "Boot refresh finished: {} succeeded, {} failed",
                    summary.succeeded.len(),
                    summary.failed.len()
                ),
                Err(e) => warn!("Boot refresh did not run: {}", e),
            }
            this.spawn_timers();
        });
        lock(&self.tasks, "tasks").push(boot);
    }

    /// Stops all timers and waits for them to wind down. Ticks already
    /// handed off finish on their own.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            debug!("Scheduler stop requested while not running");
        }
        self.shutdown.send_replace(true);

        let handles = std::mem::take(&mut *lock(&self.tasks, "tasks"));
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
        info!("Scheduler stopped");
    }

    fn spawn_timers(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }
        let mut handles = Vec::with_capacity(Category::ALL.len() + 1);
        for category in Category::ALL {
            let this = Arc::clone(self);
            handles.push(tokio::spawn(
                this.run_category_timer(category, self.shutdown.subscribe()),
            ));
        }
        handles.push(tokio::spawn(
            Arc::clone(self).run_maintenance(self.shutdown.subscribe()),
        ));
        lock(&self.tasks, "tasks").extend(handles);
    }

    async fn run_category_timer(
        self: Arc<Self>,
        category: Category,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let period = self.config.interval_for(category);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("{} timer started ({:?})", category, period);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.tick(category).await;
                    });
                }
                _ = shutdown.changed() => {}
            }
        }
        debug!("{} timer stopped", category);
    }

    async fn run_maintenance(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let now = Instant::now();
        let mut cache_cleanup = interval_at(
            now + self.config.cache_cleanup_interval,
            self.config.cache_cleanup_interval,
        );
        let mut counter_cleanup = interval_at(
            now + self.config.counter_cleanup_interval,
            self.config.counter_cleanup_interval,
        );
        let mut health_reset = interval_at(
            now + self.config.health_reset_interval,
            self.config.health_reset_interval,
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = cache_cleanup.tick() => {
                    self.cache.cleanup();
                    self.reset_counters_if_needed();
                }
                _ = counter_cleanup.tick() => {
                    self.manager.perform_counter_cleanup();
                }
                _ = health_reset.tick() => {
                    self.manager.perform_health_reset();
                }
                _ = shutdown.changed() => {}
            }
        }
    }

    /// One scheduled refresh of `category`.
    pub async fn tick(self: &Arc<Self>, category: Category) -> TickOutcome {
        if self.is_updating() {
            debug!("Full refresh running, skipping {} tick", category);
            self.record_skip(category);
            return TickOutcome::Skipped(SkipReason::FullRefreshRunning);
        }
        let Some(_guard) = self.in_flight.try_acquire(category) else {
            debug!("{} refresh still in flight, skipping tick", category);
            self.record_skip(category);
            return TickOutcome::Skipped(SkipReason::InFlight);
        };

        let timeframe = if category == Category::Ohlc {
            self.rotate_timeframe()
        } else {
            self.current_timeframe()
        };
        let outcome = self.run_fetch(request_for(category, timeframe)).await;
        if outcome == TickOutcome::Updated {
            self.broadcast();
        }
        outcome
    }

    /// Refreshes every category, one `boot_stagger` apart, and pushes one
    /// snapshot at the end if anything changed.
    pub async fn refresh_all(self: &Arc<Self>) -> Result<RefreshSummary> {
        let Some(_updating) = UpdatingFlag::try_set(&self.updating) else {
            return Err(Error::Scheduler(
                "a full refresh is already running".to_string(),
            ));
        };
        info!("Starting full refresh");

        let timeframe = self.current_timeframe();
        let stagger = self.config.boot_stagger;
        let refreshes = Category::ALL
            .iter()
            .enumerate()
            .map(|(slot, &category)| async move {
                if slot > 0 && !stagger.is_zero() {
                    tokio::time::sleep(stagger * slot as u32).await;
                }
                let outcome = match self.in_flight.try_acquire(category) {
                    Some(_guard) => self.run_fetch(request_for(category, timeframe)).await,
                    None => TickOutcome::Skipped(SkipReason::InFlight),
                };
                (category, outcome)
            });
        let results = join_all(refreshes).await;

        let mut summary = RefreshSummary::default();
        for (category, outcome) in results {
            match outcome {
                TickOutcome::Updated => {
                    summary.changed = true;
                    summary.succeeded.push(category);
                }
                TickOutcome::Unchanged => summary.succeeded.push(category),
                TickOutcome::Failed => summary.failed.push(category),
                TickOutcome::Skipped(_) => summary.skipped.push(category),
            }
        }

        if summary.changed {
            self.broadcast();
        }
        Ok(summary)
    }

    fn rotate_timeframe(&self) -> Timeframe {
        let mut current = lock(&self.current_timeframe, "timeframe");
        *current = current.next();
        *current
    }

    async fn run_fetch(&self, request: FetchRequest) -> TickOutcome {
        let category = request.category();
        match self.manager.fetch(request).await {
            Ok(result) => {
                let mut changed = self.cache.apply(&result);
                if let FetchRequest::Ohlc(timeframe) = request {
                    changed |= self.cache.update_current_timeframe(timeframe);
                }
                debug!(
                    "{} refreshed from {} (changed: {})",
                    category, result.source, changed
                );
                self.record_success(category);
                if changed {
                    TickOutcome::Updated
                } else {
                    TickOutcome::Unchanged
                }
            }
            Err(e) => {
                error!("{} refresh failed: {}", category, e);
                self.record_failure(category, &e.to_string());
                TickOutcome::Failed
            }
        }
    }

    /// Pushes the current snapshot, or schedules a trailing push when the
    /// last one went out less than `broadcast_throttle` ago.
    fn broadcast(self: &Arc<Self>) {
        let window = self.config.broadcast_throttle;
        let mut throttle = lock(&self.throttle, "throttle");
        let now = Instant::now();

        if let Some(last) = throttle.last_push {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < window {
                if !throttle.trailing_scheduled {
                    throttle.trailing_scheduled = true;
                    let delay = window - elapsed;
                    let this = Arc::clone(self);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        this.flush_trailing();
                    });
                }
                return;
            }
        }

        throttle.last_push = Some(now);
        throttle.last_push_at = Some(Utc::now());
        drop(throttle);
        self.push_snapshot();
    }

    fn flush_trailing(&self) {
        {
            let mut throttle = lock(&self.throttle, "throttle");
            throttle.trailing_scheduled = false;
            if *self.shutdown.borrow() {
                return;
            }
            throttle.last_push = Some(Instant::now());
            throttle.last_push_at = Some(Utc::now());
        }
        self.push_snapshot();
    }

    fn push_snapshot(&self) {
        let snapshot = self.cache.snapshot();
        self.broadcast_count.fetch_add(1, Ordering::Relaxed);
        self.sink.update_data(snapshot);
    }

    fn record_success(&self, category: Category) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        let mut stats = lock(&self.category_stats, "stats");
        let entry = stats.entry(category).or_default();
        entry.successes += 1;
        entry.last_success = Some(Utc::now());
    }

    fn record_failure(&self, category: Category, message: &str) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        let mut stats = lock(&self.category_stats, "stats");
        let entry = stats.entry(category).or_default();
        entry.failures += 1;
        entry.last_failure = Some(Utc::now());
        entry.last_error = Some(message.to_string());
    }

    fn record_skip(&self, category: Category) {
        let mut stats = lock(&self.category_stats, "stats");
        stats.entry(category).or_default().skipped += 1;
    }

    /// Zeroes success/error counters once either passes the ceiling.
    fn reset_counters_if_needed(&self) -> bool {
        let ceiling = self.config.counter_ceiling;
        if self.success_count.load(Ordering::Relaxed) <= ceiling
            && self.error_count.load(Ordering::Relaxed) <= ceiling
        {
            return false;
        }
        self.success_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
        for entry in lock(&self.category_stats, "stats").values_mut() {
            entry.successes = 0;
            entry.failures = 0;
            entry.skipped = 0;
        }
        info!("Scheduler counters reset after passing {}", ceiling);
        true
    }

    pub fn stats(&self) -> SchedulerStats {
        let started_at = *lock(&self.started_at, "start time");
        let uptime_seconds = started_at
            .filter(|_| self.is_running())
            .map(|t| Utc::now().signed_duration_since(t).num_seconds())
            .unwrap_or(0);
        let last_broadcast = lock(&self.throttle, "throttle").last_push_at;

        let categories = {
            let stats = lock(&self.category_stats, "stats");
            Category::ALL
                .iter()
                .map(|&category| {
                    let mut entry = stats.get(&category).cloned().unwrap_or_default();
                    entry.interval_seconds = self.config.interval_for(category).as_secs();
                    entry.in_flight = self.in_flight.contains(category);
                    (category, entry)
                })
                .collect::<BTreeMap<_, _>>()
        };
        let active_timers = lock(&self.tasks, "tasks")
            .iter()
            .filter(|h| !h.is_finished())
            .count();

        SchedulerStats {
            is_running: self.is_running(),
            is_updating: self.is_updating(),
            current_timeframe: self.current_timeframe(),
            success_count: self.success_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            broadcast_count: self.broadcast_count.load(Ordering::Relaxed),
            started_at,
            uptime_seconds,
            last_broadcast,
            active_timers,
            categories,
        }
    }

    pub fn system_stats(&self) -> SystemStats {
        SystemStats {
            scheduler: self.stats(),
            cache: self.cache.stats(),
            providers: self.manager.health_status(),
        }
    }

    /// Runs every maintenance task now.
    pub fn force_cleanup(&self) -> CleanupReport {
        let cache = self.cache.cleanup();
        let providers = self.manager.force_cleanup();
        let scheduler_counters_reset = self.reset_counters_if_needed();
        info!("Forced cleanup finished");
        CleanupReport {
            cache,
            providers,
            scheduler_counters_reset,
        }
    }
}
