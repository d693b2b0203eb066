//! CoinGecko market data provider implementation.
//!
//! Covers four categories from the public v3 API:
//! - Market via /simple/price
//! - OHLC by bucketing /coins/bitcoin/market_chart price points
//! - Supply via /coins/bitcoin
//! - Global figures and BTC dominance via /global
//!
//! The free tier is tight, so requests are spaced one second apart.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::models::{
    aggregate_price_points, clean_and_sort, round_to, Candle, Category, ExtendedSupplyData,
    GlobalData, GlobalMarketData, MarketData, PricePoint, SupplyData, SupplyInfo, Timeframe,
    BTC_MAX_SUPPLY,
};
use crate::provider::http::{parse_json, ProviderHttp};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

use models::{CoinDetailResponse, GlobalResponse, MarketChartResponse, SimplePriceResponse};

pub const PROVIDER_ID: &str = "coingecko";
const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const COIN_ID: &str = "bitcoin";

pub struct CoinGeckoProvider {
    http: ProviderHttp,
    base_url: String,
}

impl CoinGeckoProvider {
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
        RateLimit::with_min_delay(Duration::from_millis(1000))
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            categories: &[
                Category::Market,
                Category::Ohlc,
                Category::Supply,
                Category::Global,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        Self::limits()
    }

    async fn get_market_data(&self) -> Result<MarketData, MarketDataError> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_market_cap=true&include_24hr_vol=true&include_24hr_change=true",
            self.base_url, COIN_ID
        );
        let body = self.http.get_text("get_market_data", &url).await?;
        parse_market_data(&body)
    }

    async fn get_ohlc_data(&self, timeframe: Timeframe) -> Result<Vec<Candle>, MarketDataError> {
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}",
            self.base_url,
            COIN_ID,
            timeframe.coingecko_days()
        );
        let body = self.http.get_text("get_ohlc_data", &url).await?;
        let candles = parse_ohlc_data(&body, timeframe)?;
        debug!("CoinGecko: {} candles for {}", candles.len(), timeframe);
        Ok(candles)
    }

    async fn get_supply_data(&self) -> Result<SupplyData, MarketDataError> {
        let url = format!(
            "{}/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false",
            self.base_url, COIN_ID
        );
        let body = self.http.get_text("get_supply_data", &url).await?;
        parse_supply_data(&body)
    }

    async fn get_global_market_data(&self) -> Result<GlobalData, MarketDataError> {
        let url = format!("{}/global", self.base_url);
        let body = self.http.get_text("get_global_market_data", &url).await?;
        parse_global_data(&body)
    }
}

// ============================================================================
// Response normalization
// ============================================================================

pub(crate) fn parse_market_data(body: &str) -> Result<MarketData, MarketDataError> {
    let response: SimplePriceResponse = parse_json(PROVIDER_ID, "simple price", body)?;
    let price = response
        .bitcoin
        .ok_or_else(|| MarketDataError::provider_error(PROVIDER_ID, "No bitcoin entry in price response"))?;

    let current_price = price
        .usd
        .ok_or_else(|| MarketDataError::provider_error(PROVIDER_ID, "Price response has no usd price"))?;

    Ok(MarketData {
        current_price,
        price_change: price.usd_24h_change.unwrap_or(0.0),
        volume: price.usd_24h_vol.unwrap_or(0.0),
        market_cap: price.usd_market_cap.unwrap_or(0.0),
    })
}

pub(crate) fn parse_ohlc_data(body: &str, timeframe: Timeframe) -> Result<Vec<Candle>, MarketDataError> {
    let response: MarketChartResponse = parse_json(PROVIDER_ID, "market chart", body)?;

    // volumes pair with prices by position
    let points: Vec<PricePoint> = response
        .prices
        .iter()
        .enumerate()
        .filter_map(|(idx, (ts_ms, price))| {
            let price = (*price)?;
            let volume = response
                .total_volumes
                .get(idx)
                .and_then(|(_, v)| *v)
                .unwrap_or(0.0);
            Some(PricePoint {
                timestamp: (ts_ms / 1000.0).floor() as i64,
                price,
                volume,
            })
        })
        .collect();

    let candles = aggregate_price_points(points, timeframe);
    Ok(clean_and_sort(candles, Some(timeframe.max_candles())))
}

pub(crate) fn parse_supply_data(body: &str) -> Result<SupplyData, MarketDataError> {
    let response: CoinDetailResponse = parse_json(PROVIDER_ID, "coin detail", body)?;
    let market = response
        .market_data
        .ok_or_else(|| MarketDataError::provider_error(PROVIDER_ID, "Coin detail has no market_data"))?;

    let current = market
        .total_supply
        .or(market.circulating_supply)
        .ok_or_else(|| MarketDataError::provider_error(PROVIDER_ID, "Coin detail has no supply figures"))?;
    let max = market.max_supply.unwrap_or(BTC_MAX_SUPPLY);
    let total_supply = SupplyInfo::new(current, max);

    let extended = ExtendedSupplyData {
        current: Some(current),
        max: Some(max),
        percentage: Some(total_supply.percentage.clone()),
        circulating_supply: market.circulating_supply,
        ath_price: market.ath.usd(),
        ath_date: market.ath_date.usd(),
        atl_price: market.atl.usd(),
        atl_date: market.atl_date.usd(),
        price_change_percentage_from_ath: market.ath_change_percentage.usd().map(|v| round_to(v, 2)),
        market_cap_rank: response.market_cap_rank,
        liquidity_score: response.liquidity_score,
    };

    Ok(SupplyData {
        total_supply,
        extended_supply_data: Some(extended),
    })
}

pub(crate) fn parse_global_data(body: &str) -> Result<GlobalData, MarketDataError> {
    let response: GlobalResponse = parse_json(PROVIDER_ID, "global", body)?;
    let data = response.data;

    let btc_dominance = data
        .market_cap_percentage
        .get("btc")
        .copied()
        .filter(|v| *v != 0.0)
        .map(|v| round_to(v, 1));

    Ok(GlobalData {
        market_dominance: btc_dominance,
        global_market_data: GlobalMarketData {
            btc_dominance,
            total_market_cap: data.total_market_cap.get("usd").copied(),
            total_volume: data.total_volume.get("usd").copied(),
            active_cryptocurrencies: data.active_cryptocurrencies,
            market_cap_change_percentage: data.market_cap_change_percentage_24h_usd,
        },
    })
}
