use std::time::Duration;

/// Update history entries kept by the cache.
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// History entries included in cache stats.
pub const RECENT_HISTORY_IN_STATS: usize = 10;

/// Per-category update timestamps older than this are pruned.
pub const UPDATE_TIME_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache update counter ceiling. The next update after reaching it wraps the
/// counter back to 1, so history ids restart and are not increasing across
/// the wrap.
pub const UPDATE_COUNTER_CEILING: u64 = 1_000_000;

/// Scheduler success/error counters are reset above this value.
pub const SCHEDULER_COUNTER_CEILING: u64 = 1_000_000;

pub const MARKET_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const OHLC_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const BLOCKCHAIN_REFRESH_INTERVAL: Duration = Duration::from_secs(120);
pub const SUPPLY_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
pub const GLOBAL_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Delay between categories during the boot fetch.
pub const BOOT_STAGGER: Duration = Duration::from_secs(1);

/// Minimum spacing between two snapshot pushes.
pub const BROADCAST_THROTTLE: Duration = Duration::from_secs(1);

pub const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const PROVIDER_COUNTER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const PROVIDER_HEALTH_RESET_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
