use serde::{Deserialize, Serialize};

/// Maximum number of bitcoin that will ever exist.
pub const BTC_MAX_SUPPLY: f64 = 21_000_000.0;

/// Spot market figures in USD.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub current_price: f64,
    /// 24h change in percent.
    pub price_change: f64,
    /// 24h traded volume.
    pub volume: f64,
    pub market_cap: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainData {
    pub block_height: u64,
}

/// Issued vs. maximum supply. `percentage` is pre-formatted with two decimals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplyInfo {
    pub current: f64,
    pub max: f64,
    pub percentage: String,
}

impl SupplyInfo {
    pub fn new(current: f64, max: f64) -> Self {
        Self {
            current,
            max,
            percentage: format_supply_percentage(current, max),
        }
    }
}

/// `current / max * 100` with two decimals, `"0.00"` when max is unusable.
pub fn format_supply_percentage(current: f64, max: f64) -> String {
    if max > 0.0 && max.is_finite() && current.is_finite() {
        format!("{:.2}", current / max * 100.0)
    } else {
        "0.00".to_string()
    }
}

/// Supply record enriched with price extremes. Providers fill what they know.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedSupplyData {
    pub current: Option<f64>,
    pub max: Option<f64>,
    pub percentage: Option<String>,
    pub circulating_supply: Option<f64>,
    pub ath_price: Option<f64>,
    pub ath_date: Option<String>,
    pub atl_price: Option<f64>,
    pub atl_date: Option<String>,
    pub price_change_percentage_from_ath: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub liquidity_score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyData {
    pub total_supply: SupplyInfo,
    pub extended_supply_data: Option<ExtendedSupplyData>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMarketData {
    /// BTC share of total market cap, one decimal.
    pub btc_dominance: Option<f64>,
    pub total_market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub active_cryptocurrencies: Option<u64>,
    pub market_cap_change_percentage: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalData {
    /// Mirror of `global_market_data.btc_dominance` kept for older clients.
    pub market_dominance: Option<f64>,
    pub global_market_data: GlobalMarketData,
}

/// Rounds to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
