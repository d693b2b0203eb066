//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and rate limit/retry configuration
//! - The shared HTTP client wrapper that applies spacing and backoff
//! - Concrete providers (CoinGecko, CoinCap, Binance, Blockstream)
//!
//! Providers normalize their payloads into the canonical models; they
//! never touch the cache or know about each other.

mod capabilities;
pub mod http;
mod traits;

pub mod binance;
pub mod blockstream;
pub mod coincap;
pub mod coingecko;

use std::sync::Arc;

// Re-exports
pub use binance::BinanceProvider;
pub use blockstream::BlockstreamProvider;
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use coincap::CoinCapProvider;
pub use coingecko::CoinGeckoProvider;
pub use traits::MarketDataProvider;

/// The four built-in providers.
pub fn default_providers() -> Vec<Arc<dyn MarketDataProvider>> {
    vec![
        Arc::new(CoinGeckoProvider::new()),
        Arc::new(CoinCapProvider::new()),
        Arc::new(BinanceProvider::new()),
        Arc::new(BlockstreamProvider::new()),
    ]
}
