//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how it should be rate-limited and retried.

use std::time::Duration;

use crate::models::Category;

/// Describes the capabilities of a market data provider.
///
/// Used by the provider manager to drop priority entries that point at a
/// provider which cannot serve the category.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Categories this provider implements.
    pub categories: &'static [Category],
}

impl ProviderCapabilities {
    pub fn supports(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

/// Rate limiting and retry configuration for a provider.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Minimum spacing between two requests to the provider.
    pub min_delay: Duration,

    /// Attempts per call, including the first one.
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles on every further attempt.
    pub base_backoff: Duration,

    /// Upper bound for a single backoff sleep.
    pub max_backoff: Duration,
}

impl RateLimit {
    pub fn with_min_delay(min_delay: Duration) -> Self {
        Self {
            min_delay,
            ..Self::default()
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_attempts: 3,
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(10),
        }
    }
}
