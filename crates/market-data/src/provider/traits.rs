//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! Bitcoin data adapters implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{
    BlockchainData, Candle, CategoryData, FetchRequest, GlobalData, MarketData, SupplyData,
    Timeframe,
};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// One async method per category. Providers override the categories they
/// support and declare them in [`capabilities`](Self::capabilities); the
/// rest keep the default implementation, which returns
/// [`MarketDataError::Unsupported`].
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use btcpulse_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "my_provider"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             categories: &[Category::Blockchain],
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     async fn get_blockchain_data(&self) -> Result<BlockchainData, MarketDataError> {
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Lowercase constant like "coingecko". Used for logging, health
    /// tracking, priority lists and as the cache `dataSource`.
    fn id(&self) -> &'static str;

    /// Categories this provider can serve.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting and retry configuration.
    fn rate_limit(&self) -> RateLimit;

    /// Spot price, 24h change, volume and market cap.
    async fn get_market_data(&self) -> Result<MarketData, MarketDataError> {
        Err(MarketDataError::unsupported("get_market_data", self.id()))
    }

    /// Cleaned candles for `timeframe`, oldest first.
    async fn get_ohlc_data(&self, timeframe: Timeframe) -> Result<Vec<Candle>, MarketDataError> {
        let _ = timeframe;
        Err(MarketDataError::unsupported("get_ohlc_data", self.id()))
    }

    async fn get_blockchain_data(&self) -> Result<BlockchainData, MarketDataError> {
        Err(MarketDataError::unsupported("get_blockchain_data", self.id()))
    }

    async fn get_supply_data(&self) -> Result<SupplyData, MarketDataError> {
        Err(MarketDataError::unsupported("get_supply_data", self.id()))
    }

    async fn get_global_market_data(&self) -> Result<GlobalData, MarketDataError> {
        Err(MarketDataError::unsupported("get_global_market_data", self.id()))
    }

    /// Routes a request to the matching category method.
    async fn fetch(&self, request: FetchRequest) -> Result<CategoryData, MarketDataError> {
        match request {
            FetchRequest::Market => self.get_market_data().await.map(CategoryData::Market),
            FetchRequest::Ohlc(timeframe) => self
                .get_ohlc_data(timeframe)
                .await
                .map(|candles| CategoryData::Ohlc { timeframe, candles }),
            FetchRequest::Blockchain => self
                .get_blockchain_data()
                .await
                .map(CategoryData::Blockchain),
            FetchRequest::Supply => self.get_supply_data().await.map(CategoryData::Supply),
            FetchRequest::Global => self
                .get_global_market_data()
                .await
                .map(CategoryData::Global),
        }
    }
}
