//! Binance market data provider implementation.
//!
//! Public spot endpoints for the BTCUSDT pair:
//! - Market via /ticker/24hr and /ticker/price (no market cap)
//! - OHLC via /klines
//!
//! Public endpoints allow a high request rate, so spacing is 100ms.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::errors::MarketDataError;
use crate::models::{clean_and_sort, Candle, Category, MarketData, Timeframe};
use crate::provider::http::{parse_json, ProviderHttp};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const PROVIDER_ID: &str = "binance";
const BASE_URL: &str = "https://api.binance.com/api/v3";
const SYMBOL: &str = "BTCUSDT";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /ticker/24hr. Numbers are strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    price_change_percent: String,
    /// Volume in the quote asset (USDT).
    quote_volume: String,
}

/// Response from /ticker/price
#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

// ============================================================================
// BinanceProvider
// ============================================================================

pub struct BinanceProvider {
    http: ProviderHttp,
    base_url: String,
}

impl BinanceProvider {
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
        RateLimit::with_min_delay(Duration::from_millis(100))
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            categories: &[Category::Market, Category::Ohlc],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        Self::limits()
    }

    async fn get_market_data(&self) -> Result<MarketData, MarketDataError> {
        let ticker_url = format!("{}/ticker/24hr?symbol={}", self.base_url, SYMBOL);
        let price_url = format!("{}/ticker/price?symbol={}", self.base_url, SYMBOL);

        let ticker = self.http.get_text("get_market_data", &ticker_url).await?;
        let price = self.http.get_text("get_market_data", &price_url).await?;
        parse_market_data(&ticker, &price)
    }

    async fn get_ohlc_data(&self, timeframe: Timeframe) -> Result<Vec<Candle>, MarketDataError> {
        let url = format!(
            "{}/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            SYMBOL,
            timeframe.binance_interval(),
            timeframe.max_candles()
        );
        let body = self.http.get_text("get_ohlc_data", &url).await?;
        parse_klines(&body, timeframe)
    }
}

fn parse_decimal(value: &str, field: &str) -> Result<f64, MarketDataError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            MarketDataError::provider_error(PROVIDER_ID, format!("Invalid {}: '{}'", field, value))
        })
}

pub(crate) fn parse_market_data(ticker_body: &str, price_body: &str) -> Result<MarketData, MarketDataError> {
    let ticker: Ticker24h = parse_json(PROVIDER_ID, "24h ticker", ticker_body)?;
    let price: TickerPrice = parse_json(PROVIDER_ID, "ticker price", price_body)?;

    Ok(MarketData {
        current_price: parse_decimal(&price.price, "price")?,
        price_change: parse_decimal(&ticker.price_change_percent, "priceChangePercent").unwrap_or(0.0),
        volume: parse_decimal(&ticker.quote_volume, "quoteVolume").unwrap_or(0.0),
        // not published by Binance
        market_cap: 0.0,
    })
}

/// Klines are `[openTime ms, open, high, low, close, volume, closeTime, ...]`
/// with prices as strings.
pub(crate) fn parse_klines(body: &str, timeframe: Timeframe) -> Result<Vec<Candle>, MarketDataError> {
    let rows: Vec<Vec<Value>> = parse_json(PROVIDER_ID, "klines", body)?;
    let total = rows.len();

    let candles: Vec<Candle> = rows.iter().filter_map(|row| kline_to_candle(row)).collect();
    if candles.len() < total {
        warn!(
            "Binance: skipped {} unreadable klines for {}",
            total - candles.len(),
            timeframe
        );
    }

    Ok(clean_and_sort(candles, Some(timeframe.max_candles())))
}

fn kline_to_candle(row: &[Value]) -> Option<Candle> {
    let field = |idx: usize| -> Option<f64> {
        match row.get(idx)? {
            Value::String(s) => s.parse::<f64>().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };

    let open_time_ms = row.first()?.as_i64()?;
    Some(Candle {
        time: open_time_ms.div_euclid(1000),
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_market_data() {
        let ticker = r#"{"symbol":"BTCUSDT","priceChangePercent":"-2.150","volume":"12000.5","quoteVolume":"540000000.25","lastPrice":"45000.00"}"#;
        let price = r#"{"symbol":"BTCUSDT","price":"45012.34000000"}"#;
        let data = parse_market_data(ticker, price).unwrap();
        assert_eq!(data.current_price, 45012.34);
        assert_eq!(data.price_change, -2.15);
        assert_eq!(data.volume, 540000000.25);
        assert_eq!(data.market_cap, 0.0);
    }

    #[test]
    fn test_parse_market_data_rejects_bad_price() {
        let ticker = r#"{"priceChangePercent":"1","quoteVolume":"1"}"#;
        let price = r#"{"price":"abc"}"#;
        assert!(matches!(
            parse_market_data(ticker, price),
            Err(MarketDataError::ProviderError { .. })
        ));
    }

    #[test]
    fn test_parse_klines_converts_to_seconds_and_sorts() {
        let body = r#"[
            [1700003600000, "101.0", "103.0", "100.5", "102.0", "7.5", 1700007199999, "0", 1, "0", "0", "0"],
            [1700000000000, "100.0", "102.0", "99.0", "101.0", "5.0", 1700003599999, "0", 1, "0", "0", "0"],
            [1700007200000, "bad", "1", "1", "1", "1", 0, "0", 1, "0", "0", "0"]
        ]"#;
        let candles = parse_klines(body, Timeframe::OneHour).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 1_700_000_000);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[0].volume, 5.0);
        assert_eq!(candles[1].time, 1_700_003_600);
        assert_eq!(candles[1].close, 102.0);
    }

    #[test]
    fn test_parse_klines_rejects_non_array() {
        let err = parse_klines(r#"{"code":-1121,"msg":"Invalid symbol."}"#, Timeframe::OneDay)
            .unwrap_err();
        assert!(matches!(err, MarketDataError::ProviderError { .. }));
    }
}
