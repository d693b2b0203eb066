//! CoinCap market data provider implementation.
//!
//! Uses the CoinCap GraphQL endpoint for market and supply figures.
//! Numeric fields arrive as strings. CoinCap has no OHLC, blockchain or
//! global data.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::MarketDataError;
use crate::models::{
    Category, ExtendedSupplyData, MarketData, SupplyData, SupplyInfo, BTC_MAX_SUPPLY,
};
use crate::provider::http::{parse_json, ProviderHttp};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const PROVIDER_ID: &str = "coincap";
const GRAPHQL_URL: &str = "https://graphql.coincap.io";
const ASSET_ID: &str = "bitcoin";

const MARKET_QUERY: &str = "{ assets(first: 10) { edges { node { id name symbol priceUsd changePercent24Hr volumeUsd24Hr marketCapUsd } } } }";
const SUPPLY_QUERY: &str = "{ assets(first: 10) { edges { node { id name symbol supply rank } } } }";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<AssetsData>,
}

#[derive(Debug, Deserialize)]
struct AssetsData {
    assets: Option<AssetConnection>,
}

#[derive(Debug, Deserialize)]
struct AssetConnection {
    #[serde(default)]
    edges: Vec<AssetEdge>,
}

#[derive(Debug, Deserialize)]
struct AssetEdge {
    node: AssetNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetNode {
    id: String,
    price_usd: Option<Numeric>,
    change_percent24_hr: Option<Numeric>,
    volume_usd24_hr: Option<Numeric>,
    market_cap_usd: Option<Numeric>,
    supply: Option<Numeric>,
    rank: Option<Numeric>,
}

/// CoinCap encodes numbers as strings; accept either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn value(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|v| v.is_finite())
    }
}

fn number(field: &Option<Numeric>) -> Option<f64> {
    field.as_ref().and_then(Numeric::value)
}

// ============================================================================
// CoinCapProvider
// ============================================================================

pub struct CoinCapProvider {
    http: ProviderHttp,
    url: String,
}

impl CoinCapProvider {
    pub fn new() -> Self {
        Self::with_url(GRAPHQL_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            http: ProviderHttp::new(PROVIDER_ID, &Self::limits()),
            url: url.into(),
        }
    }

    fn limits() -> RateLimit {
        RateLimit::with_min_delay(Duration::from_millis(200))
    }

    async fn query(&self, operation: &'static str, query: &str) -> Result<String, MarketDataError> {
        let body = json!({ "query": query });
        self.http.post_json(operation, &self.url, &body).await
    }
}

impl Default for CoinCapProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for CoinCapProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            categories: &[Category::Market, Category::Supply],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        Self::limits()
    }

    async fn get_market_data(&self) -> Result<MarketData, MarketDataError> {
        let body = self.query("get_market_data", MARKET_QUERY).await?;
        parse_market_data(&body)
    }

    async fn get_supply_data(&self) -> Result<SupplyData, MarketDataError> {
        let body = self.query("get_supply_data", SUPPLY_QUERY).await?;
        parse_supply_data(&body)
    }
}

fn find_bitcoin(body: &str, what: &str) -> Result<AssetNode, MarketDataError> {
    let response: GraphQlResponse = parse_json(PROVIDER_ID, what, body)?;
    response
        .data
        .and_then(|d| d.assets)
        .map(|a| a.edges)
        .unwrap_or_default()
        .into_iter()
        .map(|edge| edge.node)
        .find(|node| node.id == ASSET_ID)
        .ok_or_else(|| {
            MarketDataError::provider_error(
                PROVIDER_ID,
                format!("No {} received for Bitcoin", what),
            )
        })
}

pub(crate) fn parse_market_data(body: &str) -> Result<MarketData, MarketDataError> {
    let node = find_bitcoin(body, "market data")?;
    let current_price = number(&node.price_usd).ok_or_else(|| {
        MarketDataError::provider_error(PROVIDER_ID, "Bitcoin asset has no priceUsd")
    })?;

    Ok(MarketData {
        current_price,
        price_change: number(&node.change_percent24_hr).unwrap_or(0.0),
        volume: number(&node.volume_usd24_hr).unwrap_or(0.0),
        market_cap: number(&node.market_cap_usd).unwrap_or(0.0),
    })
}

pub(crate) fn parse_supply_data(body: &str) -> Result<SupplyData, MarketDataError> {
    let node = find_bitcoin(body, "supply data")?;
    let current = number(&node.supply).ok_or_else(|| {
        MarketDataError::provider_error(PROVIDER_ID, "Bitcoin asset has no supply")
    })?;
    let total_supply = SupplyInfo::new(current, BTC_MAX_SUPPLY);

    let extended = ExtendedSupplyData {
        current: Some(current),
        max: Some(BTC_MAX_SUPPLY),
        percentage: Some(total_supply.percentage.clone()),
        // CoinCap's supply is the circulating supply
        circulating_supply: Some(current),
        market_cap_rank: number(&node.rank)
            .filter(|r| *r >= 1.0)
            .map(|r| r as u32),
        ..ExtendedSupplyData::default()
    };

    Ok(SupplyData {
        total_supply,
        extended_supply_data: Some(extended),
    })
}
