use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use btcpulse_market_data::{Category, ProviderCleanupReport, ProviderHealthReport, Timeframe};

use crate::cache::{CacheCleanupReport, CacheStats};
use crate::constants::{
    BLOCKCHAIN_REFRESH_INTERVAL, BOOT_STAGGER, BROADCAST_THROTTLE, CACHE_CLEANUP_INTERVAL,
    GLOBAL_REFRESH_INTERVAL, MARKET_REFRESH_INTERVAL, OHLC_REFRESH_INTERVAL,
    PROVIDER_COUNTER_CLEANUP_INTERVAL, PROVIDER_HEALTH_RESET_INTERVAL, SCHEDULER_COUNTER_CEILING,
    SUPPLY_REFRESH_INTERVAL,
};
use crate::errors::{Error, Result};

/// Refresh cadences and maintenance periods.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub market_interval: Duration,
    pub ohlc_interval: Duration,
    pub blockchain_interval: Duration,
    pub supply_interval: Duration,
    pub global_interval: Duration,
    /// Gap between categories in a full refresh.
    pub boot_stagger: Duration,
    /// Minimum spacing between snapshot pushes. Zero disables throttling.
    pub broadcast_throttle: Duration,
    pub cache_cleanup_interval: Duration,
    pub counter_cleanup_interval: Duration,
    pub health_reset_interval: Duration,
    pub counter_ceiling: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            market_interval: MARKET_REFRESH_INTERVAL,
            ohlc_interval: OHLC_REFRESH_INTERVAL,
            blockchain_interval: BLOCKCHAIN_REFRESH_INTERVAL,
            supply_interval: SUPPLY_REFRESH_INTERVAL,
            global_interval: GLOBAL_REFRESH_INTERVAL,
            boot_stagger: BOOT_STAGGER,
            broadcast_throttle: BROADCAST_THROTTLE,
            cache_cleanup_interval: CACHE_CLEANUP_INTERVAL,
            counter_cleanup_interval: PROVIDER_COUNTER_CLEANUP_INTERVAL,
            health_reset_interval: PROVIDER_HEALTH_RESET_INTERVAL,
            counter_ceiling: SCHEDULER_COUNTER_CEILING,
        }
    }
}

impl SchedulerConfig {
    pub fn interval_for(&self, category: Category) -> Duration {
        match category {
            Category::Market => self.market_interval,
            Category::Ohlc => self.ohlc_interval,
            Category::Blockchain => self.blockchain_interval,
            Category::Supply => self.supply_interval,
            Category::Global => self.global_interval,
        }
    }

    /// Rejects zero periods, which `tokio::time::interval` cannot run.
    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            if self.interval_for(category).is_zero() {
                return Err(Error::InvalidConfigValue(format!(
                    "refresh interval for {} must be greater than zero",
                    category
                )));
            }
        }
        let maintenance = [
            ("cache cleanup interval", self.cache_cleanup_interval),
            ("counter cleanup interval", self.counter_cleanup_interval),
            ("health reset interval", self.health_reset_interval),
        ];
        for (name, period) in maintenance {
            if period.is_zero() {
                return Err(Error::InvalidConfigValue(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Why a tick did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// The previous refresh for this category hasn't finished.
    InFlight,
    /// A full refresh owns every category right now.
    FullRefreshRunning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Fetched and the cache changed.
    Updated,
    /// Fetched but the cache already held the same values.
    Unchanged,
    Failed,
    Skipped(SkipReason),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub succeeded: Vec<Category>,
    pub failed: Vec<Category>,
    pub skipped: Vec<Category>,
    pub changed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub interval_seconds: u64,
    pub successes: u64,
    pub failures: u64,
    pub skipped: u64,
    pub in_flight: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub is_running: bool,
    pub is_updating: bool,
    pub current_timeframe: Timeframe,
    pub success_count: u64,
    pub error_count: u64,
    pub broadcast_count: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_seconds: i64,
    pub last_broadcast: Option<DateTime<Utc>>,
    pub active_timers: usize,
    pub categories: BTreeMap<Category, CategoryStats>,
}

/// Scheduler, cache and provider diagnostics in one document.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub scheduler: SchedulerStats,
    pub cache: CacheStats,
    pub providers: ProviderHealthReport,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub cache: CacheCleanupReport,
    pub providers: ProviderCleanupReport,
    pub scheduler_counters_reset: bool,
}
