//! Minimum-spacing rate limiter for market data providers.
//!
//! Each provider gets a slot that remembers when the next request may start.
//! Callers reserve the next free instant under the lock and then sleep
//! outside it, so concurrent callers queue up one `min_delay` apart instead
//! of waking together.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

/// Spacing used for providers that were never configured.
const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct Slot {
    min_delay: Duration,
    /// Earliest instant the next request may start.
    next_free: Option<Instant>,
}

impl Slot {
    fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_free: None,
        }
    }

    /// Books the next start time and returns how long the caller must wait.
    fn reserve(&mut self, now: Instant) -> Duration {
        let start = match self.next_free {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_free = Some(start + self.min_delay);
        start - now
    }
}

/// Per-provider request spacing.
///
/// Thread-safe. Slots are created on demand with the default spacing, or
/// configured up front with the provider's own `min_delay`.
pub struct RateLimiter {
    slots: Mutex<HashMap<String, Slot>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the slots mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is one request spaced slightly wrong.
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter slots mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Set the spacing for a provider. Any pending reservation is kept.
    pub fn configure(&self, provider: &str, min_delay: Duration) {
        let mut slots = self.lock_slots();
        slots
            .entry(provider.to_string())
            .and_modify(|slot| slot.min_delay = min_delay)
            .or_insert_with(|| Slot::new(min_delay));
    }

    /// Wait until the provider may be called again.
    pub async fn acquire(&self, provider: &str) {
        let wait = {
            let mut slots = self.lock_slots();
            slots
                .entry(provider.to_string())
                .or_insert_with(|| Slot::new(DEFAULT_MIN_DELAY))
                .reserve(Instant::now())
        };

        if wait > Duration::ZERO {
            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait, provider
            );
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
