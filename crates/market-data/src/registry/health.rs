//! Per-provider health tracking.
//!
//! A provider turns unhealthy after a run of consecutive failures and
//! becomes eligible again on its next success, or through the periodic
//! health reset once its last failure is old enough. Request counters are
//! monotonic `u64`s that get rescaled (ratio preserved) instead of zeroed.
//!
//! State is in-memory and resets on restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

/// Consecutive failures before a provider is marked unhealthy.
pub const DEFAULT_UNHEALTHY_THRESHOLD: u32 = 3;

/// Counters are rescaled before an increment once they reach this value.
pub const DEFAULT_COUNTER_CEILING: u64 = u64::MAX - 10_000;

/// Periodic maintenance rescales counters above this value.
pub const DEFAULT_RESCALE_THRESHOLD: u64 = 1_000_000;

/// Total request count after a rescale.
pub const DEFAULT_RESCALE_BASE: u64 = 1_000;

/// Unhealthy providers whose last failure is older than this are reset.
pub const DEFAULT_RESET_AFTER: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug)]
pub struct HealthConfig {
    pub unhealthy_threshold: u32,
    pub counter_ceiling: u64,
    pub rescale_threshold: u64,
    pub rescale_base: u64,
    pub reset_after: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unhealthy_threshold: DEFAULT_UNHEALTHY_THRESHOLD,
            counter_ceiling: DEFAULT_COUNTER_CEILING,
            rescale_threshold: DEFAULT_RESCALE_THRESHOLD,
            rescale_base: DEFAULT_RESCALE_BASE,
            reset_after: DEFAULT_RESET_AFTER,
        }
    }
}

/// Health record of one provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterHealth {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_counter_reset: DateTime<Utc>,
}

impl AdapterHealth {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            total_requests: 0,
            successful_requests: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            last_counter_reset: now,
        }
    }

    /// Successful share of all requests, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }

    fn rescale(&mut self, base: u64, now: DateTime<Utc>) {
        let (total, successful) =
            rescale_counters(self.total_requests, self.successful_requests, base);
        self.total_requests = total;
        self.successful_requests = successful;
        self.last_counter_reset = now;
    }
}

/// Shrinks `(total, successful)` so that `total == min(base, total)` while
/// keeping the success ratio. Never grows the counters.
pub fn rescale_counters(total: u64, successful: u64, base: u64) -> (u64, u64) {
    let target = base.min(total);
    if target == 0 {
        return (total, successful.min(total));
    }
    let ratio = successful.min(total) as f64 / total as f64;
    let scaled = (ratio * target as f64).round() as u64;
    (target, scaled.min(target))
}

/// Thread-safe health tracker for all providers.
pub struct HealthTracker {
    entries: Mutex<HashMap<String, AdapterHealth>>,
    config: HealthConfig,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::with_config(HealthConfig::default())
    }

    /// `rescale_base` is clamped below both `counter_ceiling` and
    /// `rescale_threshold` so a rescaled counter is not rescaled again.
    pub fn with_config(mut config: HealthConfig) -> Self {
        let limit = config.counter_ceiling.min(config.rescale_threshold);
        if config.rescale_base >= limit {
            config.rescale_base = limit / 2;
        }
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Lock the entries mutex, recovering from poison if necessary.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, AdapterHealth>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Health tracker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Start tracking a provider with a clean record.
    pub fn register(&self, provider: &str) {
        let mut entries = self.lock_entries();
        entries
            .entry(provider.to_string())
            .or_insert_with(|| AdapterHealth::new(Utc::now()));
    }

    /// Unknown providers count as healthy.
    pub fn is_healthy(&self, provider: &str) -> bool {
        let entries = self.lock_entries();
        entries.get(provider).map(|h| h.healthy).unwrap_or(true)
    }

    pub fn get(&self, provider: &str) -> Option<AdapterHealth> {
        self.lock_entries().get(provider).cloned()
    }

    /// Copy of every record, ordered by provider id.
    pub fn snapshot(&self) -> BTreeMap<String, AdapterHealth> {
        self.lock_entries()
            .iter()
            .map(|(id, health)| (id.clone(), health.clone()))
            .collect()
    }

    pub fn record_success(&self, provider: &str) {
        let now = Utc::now();
        let mut entries = self.lock_entries();
        let health = entries
            .entry(provider.to_string())
            .or_insert_with(|| AdapterHealth::new(now));

        self.guard_ceiling(provider, health, now);
        health.total_requests += 1;
        health.successful_requests += 1;
        health.consecutive_failures = 0;
        health.last_success = Some(now);

        if !health.healthy {
            info!("Provider '{}' recovered, marking healthy", provider);
            health.healthy = true;
        }
    }

    pub fn record_failure(&self, provider: &str, error: &str) {
        let now = Utc::now();
        let mut entries = self.lock_entries();
        let health = entries
            .entry(provider.to_string())
            .or_insert_with(|| AdapterHealth::new(now));

        self.guard_ceiling(provider, health, now);
        health.total_requests += 1;
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_failure = Some(now);
        health.last_error = Some(error.to_string());

        if health.healthy && health.consecutive_failures >= self.config.unhealthy_threshold {
            warn!(
                "Provider '{}' marked unhealthy after {} consecutive failures",
                provider, health.consecutive_failures
            );
            health.healthy = false;
        } else {
            debug!(
                "Provider '{}' failure {} recorded: {}",
                provider, health.consecutive_failures, error
            );
        }
    }

    fn guard_ceiling(&self, provider: &str, health: &mut AdapterHealth, now: DateTime<Utc>) {
        if health.total_requests >= self.config.counter_ceiling {
            info!(
                "Provider '{}' request counter reached ceiling, rescaling",
                provider
            );
            health.rescale(self.config.rescale_base, now);
        }
    }

    /// Rescale counters above the periodic threshold. Returns how many
    /// providers were rescaled.
    pub fn rescale_large_counters(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.lock_entries();
        let mut rescaled = 0;
        for (provider, health) in entries.iter_mut() {
            if health.total_requests > self.config.rescale_threshold {
                debug!(
                    "Rescaling counters for '{}' ({} requests, {:.1}% success)",
                    provider,
                    health.total_requests,
                    health.success_rate()
                );
                health.rescale(self.config.rescale_base, now);
                rescaled += 1;
            }
        }
        rescaled
    }

    /// Mark unhealthy providers healthy again when their last failure is
    /// older than `reset_after`. Returns the ids that were reset.
    pub fn reset_stale(&self) -> Vec<String> {
        self.reset_stale_at(Utc::now())
    }

    pub fn reset_stale_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let reset_after =
            chrono::Duration::from_std(self.config.reset_after).unwrap_or(chrono::Duration::hours(1));
        let mut entries = self.lock_entries();
        let mut reset = Vec::new();
        for (provider, health) in entries.iter_mut() {
            let stale = health
                .last_failure
                .map(|at| now - at > reset_after)
                .unwrap_or(true);
            if !health.healthy && stale {
                info!("Health reset: provider '{}' is eligible again", provider);
                health.healthy = true;
                health.consecutive_failures = 0;
                reset.push(provider.clone());
            }
        }
        reset.sort();
        reset
    }

    /// Mark every provider healthy and clear failure streaks.
    pub fn reset_all(&self) {
        let mut entries = self.lock_entries();
        for health in entries.values_mut() {
            health.healthy = true;
            health.consecutive_failures = 0;
        }
        info!("Health reset for all {} providers", entries.len());
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_after_three_consecutive_failures() {
        let tracker = HealthTracker::new();
        tracker.register("coingecko");

        tracker.record_failure("coingecko", "timeout");
        tracker.record_failure("coingecko", "timeout");
        assert!(tracker.is_healthy("coingecko"));

        tracker.record_failure("coingecko", "timeout");
        assert!(!tracker.is_healthy("coingecko"));

        let health = tracker.get("coingecko").unwrap();
        assert_eq!(health.consecutive_failures, 3);
        assert_eq!(health.total_requests, 3);
        assert_eq!(health.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_success_clears_streak_and_restores_health() {
        let tracker = HealthTracker::new();
        for _ in 0..3 {
            tracker.record_failure("binance", "HTTP 500");
        }
        assert!(!tracker.is_healthy("binance"));

        tracker.record_success("binance");
        let health = tracker.get("binance").unwrap();
        assert!(health.healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.successful_requests, 1);
        assert_eq!(health.total_requests, 4);
    }

    #[test]
    fn test_interleaved_success_prevents_unhealthy() {
        let tracker = HealthTracker::new();
        tracker.record_failure("coincap", "x");
        tracker.record_failure("coincap", "x");
        tracker.record_success("coincap");
        tracker.record_failure("coincap", "x");
        tracker.record_failure("coincap", "x");
        assert!(tracker.is_healthy("coincap"));
    }

    #[test]
    fn test_unknown_provider_is_healthy() {
        let tracker = HealthTracker::new();
        assert!(tracker.is_healthy("nobody"));
        assert!(tracker.get("nobody").is_none());
    }

    #[test]
    fn test_reset_stale_only_after_quiet_period() {
        let tracker = HealthTracker::new();
        for _ in 0..3 {
            tracker.record_failure("coingecko", "down");
        }

        let soon = Utc::now() + chrono::Duration::minutes(30);
        assert!(tracker.reset_stale_at(soon).is_empty());
        assert!(!tracker.is_healthy("coingecko"));

        let later = Utc::now() + chrono::Duration::minutes(61);
        assert_eq!(tracker.reset_stale_at(later), vec!["coingecko".to_string()]);
        let health = tracker.get("coingecko").unwrap();
        assert!(health.healthy);
        assert_eq!(health.consecutive_failures, 0);
    }

    #[test]
    fn test_counters_stay_below_ceiling() {
        let tracker = HealthTracker::with_config(HealthConfig {
            counter_ceiling: 50,
            rescale_base: 10,
            ..HealthConfig::default()
        });

        for i in 0..500 {
            if i % 4 == 0 {
                tracker.record_failure("blockstream", "x");
            } else {
                tracker.record_success("blockstream");
            }
            let health = tracker.get("blockstream").unwrap();
            assert!(health.total_requests <= 50);
            assert!(health.successful_requests <= health.total_requests);
        }
    }

    #[test]
    fn test_periodic_rescale_preserves_ratio() {
        let tracker = HealthTracker::with_config(HealthConfig {
            rescale_threshold: 100,
            ..HealthConfig::default()
        });
        for i in 0..200 {
            if i % 5 == 0 {
                tracker.record_failure("coingecko", "x");
            } else {
                tracker.record_success("coingecko");
            }
        }
        let before = tracker.get("coingecko").unwrap().success_rate();
        assert_eq!(tracker.config().rescale_base, 50);

        assert_eq!(tracker.rescale_large_counters(), 1);
        let health = tracker.get("coingecko").unwrap();
        assert_eq!(health.total_requests, 50);
        assert!((health.success_rate() - before).abs() <= 1.0);

        // below threshold now, nothing to do
        assert_eq!(tracker.rescale_large_counters(), 0);
        assert_eq!(tracker.get("coingecko").unwrap().total_requests, 50);
    }

    #[test]
    fn test_rescale_counters_handles_zero_total() {
        assert_eq!(rescale_counters(0, 0, 1000), (0, 0));
        assert_eq!(rescale_counters(3_000_000, 2_400_000, 1000), (1000, 800));
    }

    #[test]
    fn test_rescale_counters_never_grow() {
        assert_eq!(rescale_counters(200, 160, 1000), (200, 160));
        assert_eq!(rescale_counters(1000, 999, 1000), (1000, 999));
    }

    fn seed(tracker: &HealthTracker, provider: &str, total: u64, successful: u64) {
        tracker.register(provider);
        let mut entries = tracker.lock_entries();
        let health = entries.get_mut(provider).unwrap();
        health.total_requests = total;
        health.successful_requests = successful;
    }

    #[test]
    fn test_counter_near_ceiling_is_rescaled_on_next_request() {
        let tracker = HealthTracker::new();
        let total = DEFAULT_COUNTER_CEILING;
        seed(&tracker, "coingecko", total, total / 4 * 3);
        let before = tracker.get("coingecko").unwrap().success_rate();

        for _ in 0..3 {
            tracker.record_success("coingecko");
            let health = tracker.get("coingecko").unwrap();
            assert!(health.total_requests < DEFAULT_COUNTER_CEILING);
        }

        let health = tracker.get("coingecko").unwrap();
        assert_eq!(health.total_requests, DEFAULT_RESCALE_BASE + 3);
        assert!((health.success_rate() - before).abs() <= 1.0);
    }

    #[test]
    fn test_periodic_cleanup_shrinks_huge_counters() {
        let tracker = HealthTracker::new();
        let total = u64::MAX - 20_000;
        seed(&tracker, "binance", total, total / 10 * 9);
        seed(&tracker, "blockstream", 500, 500);
        let before = tracker.get("binance").unwrap().success_rate();

        assert_eq!(tracker.rescale_large_counters(), 1);

        let health = tracker.get("binance").unwrap();
        assert_eq!(health.total_requests, DEFAULT_RESCALE_BASE);
        assert!(health.total_requests < DEFAULT_COUNTER_CEILING);
        assert!((health.success_rate() - before).abs() <= 1.0);
        assert_eq!(tracker.get("blockstream").unwrap().total_requests, 500);
    }
}
