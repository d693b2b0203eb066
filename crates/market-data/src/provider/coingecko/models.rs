//! CoinGecko API response structures.

use std::collections::HashMap;

use serde::Deserialize;

/// Response from /simple/price
#[derive(Debug, Deserialize)]
pub struct SimplePriceResponse {
    pub bitcoin: Option<SimplePrice>,
}

#[derive(Debug, Deserialize)]
pub struct SimplePrice {
    pub usd: Option<f64>,
    pub usd_market_cap: Option<f64>,
    pub usd_24h_vol: Option<f64>,
    pub usd_24h_change: Option<f64>,
}

/// Response from /coins/{id}/market_chart. Each entry is `[ms, value]`.
#[derive(Debug, Deserialize)]
pub struct MarketChartResponse {
    #[serde(default)]
    pub prices: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, Option<f64>)>,
}

/// Response from /coins/{id}
#[derive(Debug, Deserialize)]
pub struct CoinDetailResponse {
    pub market_cap_rank: Option<u32>,
    pub liquidity_score: Option<f64>,
    pub market_data: Option<CoinMarketData>,
}

#[derive(Debug, Deserialize)]
pub struct CoinMarketData {
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub ath: CurrencyMap<f64>,
    #[serde(default)]
    pub ath_date: CurrencyMap<String>,
    #[serde(default)]
    pub atl: CurrencyMap<f64>,
    #[serde(default)]
    pub atl_date: CurrencyMap<String>,
    #[serde(default)]
    pub ath_change_percentage: CurrencyMap<f64>,
}

/// Per-currency values keyed by lowercase currency code.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct CurrencyMap<T>(pub HashMap<String, Option<T>>);

impl<T> Default for CurrencyMap<T> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<T: Clone> CurrencyMap<T> {
    pub fn usd(&self) -> Option<T> {
        self.0.get("usd").cloned().flatten()
    }
}

/// Response from /global
#[derive(Debug, Deserialize)]
pub struct GlobalResponse {
    pub data: GlobalBody,
}

#[derive(Debug, Deserialize)]
pub struct GlobalBody {
    #[serde(default)]
    pub market_cap_percentage: HashMap<String, f64>,
    #[serde(default)]
    pub total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    pub total_volume: HashMap<String, f64>,
    pub active_cryptocurrencies: Option<u64>,
    pub market_cap_change_percentage_24h_usd: Option<f64>,
}
