//! btcpulse market data crate
//!
//! Provider-agnostic acquisition of Bitcoin market data from several public
//! APIs, with per-provider rate limiting, retry with backoff, health
//! tracking and per-category fallback.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  FetchRequest    |  (category + timeframe)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | ProviderManager  | --> |  HealthTracker   |  (rotation, fallback, health)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |    Provider      | --> |  ProviderHttp    |  (rate limit + retry per attempt)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |   FetchResult    |  (normalized data + source id)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Category`] - The five refresh categories
//! - [`Timeframe`] - Candle bucket widths with rotation order
//! - [`Candle`] - OHLCV bar, see [`clean_and_sort`]
//! - [`FetchRequest`] / [`FetchResult`] - Manager input and output
//! - [`MarketDataProvider`] - Trait every adapter implements
//! - [`ProviderManager`] - Rotation and fallback across providers

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{MarketDataError, RetryClass};
pub use models::{
    aggregate_price_points, clean_and_sort, BlockchainData, Candle, Category, CategoryData,
    ExtendedSupplyData, FetchRequest, FetchResult, GlobalData, GlobalMarketData, MarketData,
    PricePoint, SupplyData, SupplyInfo, Timeframe,
};
pub use provider::{
    default_providers, BinanceProvider, BlockstreamProvider, CoinCapProvider, CoinGeckoProvider,
    MarketDataProvider, ProviderCapabilities, RateLimit,
};
pub use registry::{
    default_priorities, AdapterHealth, HealthConfig, HealthTracker, ProviderCleanupReport,
    ProviderHealthReport, ProviderManager, ProviderStatus, RateLimiter, RetryPolicy,
};
