//! Blockstream Esplora provider implementation.
//!
//! Only serves the chain tip height, returned as plain text by
//! /blocks/tip/height.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{BlockchainData, Category};
use crate::provider::http::ProviderHttp;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const PROVIDER_ID: &str = "blockstream";
const BASE_URL: &str = "https://blockstream.info/api";

pub struct BlockstreamProvider {
    http: ProviderHttp,
    base_url: String,
}

impl BlockstreamProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: ProviderHttp::new(PROVIDER_ID, &Self::limits()),
            base_url: base_url.into(),
        }
    }

    fn limits() -> RateLimit {
        RateLimit::with_min_delay(Duration::from_millis(500))
    }
}

impl Default for BlockstreamProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for BlockstreamProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            categories: &[Category::Blockchain],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        Self::limits()
    }

    async fn get_blockchain_data(&self) -> Result<BlockchainData, MarketDataError> {
        let url = format!("{}/blocks/tip/height", self.base_url);
        let body = self.http.get_text("get_blockchain_data", &url).await?;
        parse_tip_height(&body)
    }
}

pub(crate) fn parse_tip_height(body: &str) -> Result<BlockchainData, MarketDataError> {
    let block_height = body.trim().parse::<u64>().map_err(|_| {
        MarketDataError::provider_error(
            PROVIDER_ID,
            format!("Unexpected tip height body: '{}'", body.trim()),
        )
    })?;
    Ok(BlockchainData { block_height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tip_height() {
        assert_eq!(parse_tip_height("820000\n").unwrap().block_height, 820_000);
    }

    #[test]
    fn test_parse_tip_height_rejects_garbage() {
        assert!(parse_tip_height("<html>oops</html>").is_err());
        assert!(parse_tip_height("-1").is_err());
    }

    #[tokio::test]
    async fn test_market_data_is_unsupported() {
        let provider = BlockstreamProvider::new();
        let err = provider.get_market_data().await.unwrap_err();
        assert!(matches!(err, MarketDataError::Unsupported { .. }));
    }
}
