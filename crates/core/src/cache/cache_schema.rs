//! Shape checks applied to every payload before it is merged.
//!
//! Typed payloads from the provider manager are checked for finite numbers
//! and sane ranges. Raw JSON payloads (admin pushes, replays) are first
//! decoded against the typed models, so a price sent as a string is
//! rejected at decode time.

use serde::de::DeserializeOwned;
use serde_json::Value;

use btcpulse_market_data::{
    BlockchainData, Candle, Category, CategoryData, GlobalData, MarketData, SupplyData,
    Timeframe,
};

use crate::errors::ValidationError;

type SchemaResult = std::result::Result<(), ValidationError>;

/// Validates a typed payload.
pub fn validate_payload(data: &CategoryData) -> SchemaResult {
    match data {
        CategoryData::Market(market) => validate_market(market),
        CategoryData::Ohlc { candles, .. } => validate_candles(candles),
        CategoryData::Blockchain(chain) => validate_blockchain(chain),
        CategoryData::Supply(supply) => validate_supply(supply),
        CategoryData::Global(global) => validate_global(global),
    }
}

/// Decodes and validates a raw JSON payload for `category`.
///
/// OHLC payloads are a bare candle array and need the `timeframe`.
pub fn parse_payload(
    category: Category,
    timeframe: Option<Timeframe>,
    value: &Value,
) -> std::result::Result<CategoryData, ValidationError> {
    let data = match category {
        Category::Market => CategoryData::Market(decode(value)?),
        Category::Ohlc => {
            let timeframe =
                timeframe.ok_or_else(|| ValidationError::MissingField("timeframe".to_string()))?;
            CategoryData::Ohlc {
                timeframe,
                candles: decode(value)?,
            }
        }
        Category::Blockchain => CategoryData::Blockchain(decode(value)?),
        Category::Supply => CategoryData::Supply(decode(value)?),
        Category::Global => CategoryData::Global(decode(value)?),
    };
    validate_payload(&data)?;
    Ok(data)
}

fn decode<T: DeserializeOwned>(value: &Value) -> std::result::Result<T, ValidationError> {
    T::deserialize(value).map_err(|e| ValidationError::Malformed(e.to_string()))
}

fn finite(field: &str, value: f64) -> SchemaResult {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::invalid(field, "must be a finite number"))
    }
}

fn finite_opt(field: &str, value: Option<f64>) -> SchemaResult {
    value.map_or(Ok(()), |v| finite(field, v))
}

fn validate_market(market: &MarketData) -> SchemaResult {
    finite("currentPrice", market.current_price)?;
    finite("priceChange", market.price_change)?;
    finite("volume", market.volume)?;
    finite("marketCap", market.market_cap)?;
    if market.current_price <= 0.0 {
        return Err(ValidationError::invalid("currentPrice", "must be positive"));
    }
    Ok(())
}

fn validate_candles(candles: &[Candle]) -> SchemaResult {
    for (idx, candle) in candles.iter().enumerate() {
        if !candle.is_well_formed() {
            return Err(ValidationError::invalid(
                format!("ohlcData[{}]", idx),
                "candle is not well formed",
            ));
        }
    }
    if candles.windows(2).any(|w| w[0].time >= w[1].time) {
        return Err(ValidationError::invalid(
            "ohlcData",
            "candle times must be strictly increasing",
        ));
    }
    Ok(())
}

fn validate_blockchain(chain: &BlockchainData) -> SchemaResult {
    if chain.block_height == 0 {
        return Err(ValidationError::invalid("blockHeight", "must be positive"));
    }
    Ok(())
}

fn validate_supply(supply: &SupplyData) -> SchemaResult {
    let total = &supply.total_supply;
    finite("totalSupply.current", total.current)?;
    finite("totalSupply.max", total.max)?;
    if total.percentage.parse::<f64>().is_err() {
        return Err(ValidationError::invalid(
            "totalSupply.percentage",
            "must be a numeric string",
        ));
    }
    if let Some(ext) = &supply.extended_supply_data {
        finite_opt("extendedSupplyData.current", ext.current)?;
        finite_opt("extendedSupplyData.max", ext.max)?;
        finite_opt("extendedSupplyData.circulatingSupply", ext.circulating_supply)?;
        finite_opt("extendedSupplyData.athPrice", ext.ath_price)?;
        finite_opt("extendedSupplyData.atlPrice", ext.atl_price)?;
        finite_opt(
            "extendedSupplyData.priceChangePercentageFromAth",
            ext.price_change_percentage_from_ath,
        )?;
        finite_opt("extendedSupplyData.liquidityScore", ext.liquidity_score)?;
    }
    Ok(())
}

fn validate_global(global: &GlobalData) -> SchemaResult {
    finite_opt("marketDominance", global.market_dominance)?;
    let data = &global.global_market_data;
    finite_opt("globalMarketData.btcDominance", data.btc_dominance)?;
    finite_opt("globalMarketData.totalMarketCap", data.total_market_cap)?;
    finite_opt("globalMarketData.totalVolume", data.total_volume)?;
    finite_opt(
        "globalMarketData.marketCapChangePercentage",
        data.market_cap_change_percentage,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_market_payload_accepts_numbers() {
        let value = json!({
            "currentPrice": 45000.0,
            "priceChange": 1.5,
            "volume": 1.2e10,
            "marketCap": 8.8e11
        });
        let data = parse_payload(Category::Market, None, &value).unwrap();
        assert!(matches!(data, CategoryData::Market(m) if m.current_price == 45000.0));
    }

    #[test]
    fn test_market_payload_rejects_string_price() {
        let value = json!({
            "currentPrice": "45000",
            "priceChange": 1.5,
            "volume": 1.2e10,
            "marketCap": 8.8e11
        });
        let err = parse_payload(Category::Market, None, &value).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn test_market_payload_requires_all_fields() {
        let value = json!({ "currentPrice": 45000.0 });
        assert!(parse_payload(Category::Market, None, &value).is_err());
    }

    #[test]
    fn test_ohlc_payload_requires_timeframe() {
        let value = json!([]);
        let err = parse_payload(Category::Ohlc, None, &value).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("timeframe".to_string()));
    }

    #[test]
    fn test_ohlc_payload_rejects_bad_candle() {
        let value = json!([
            { "time": 1_700_000_100, "open": 10.0, "high": 12.0, "low": 9.0, "close": 11.0 },
            { "time": 1_700_000_400, "open": 10.0, "high": 5.0, "low": 9.0, "close": 11.0 }
        ]);
        let err = parse_payload(Category::Ohlc, Some(Timeframe::FiveMinutes), &value).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { field, .. } if field == "ohlcData[1]"));
    }

    #[test]
    fn test_ohlc_payload_rejects_unordered_candles() {
        let value = json!([
            { "time": 1_700_000_400, "open": 10.0, "high": 12.0, "low": 9.0, "close": 11.0 },
            { "time": 1_700_000_100, "open": 10.0, "high": 12.0, "low": 9.0, "close": 11.0 }
        ]);
        assert!(parse_payload(Category::Ohlc, Some(Timeframe::OneHour), &value).is_err());
    }

    #[test]
    fn test_supply_percentage_must_be_numeric_string() {
        let value = json!({
            "totalSupply": { "current": 19_500_000.0, "max": 21_000_000.0, "percentage": "n/a" },
            "extendedSupplyData": null
        });
        assert!(parse_payload(Category::Supply, None, &value).is_err());

        let value = json!({
            "totalSupply": { "current": 19_500_000.0, "max": 21_000_000.0, "percentage": "92.86" }
        });
        assert!(parse_payload(Category::Supply, None, &value).is_ok());
    }

    #[test]
    fn test_blockchain_rejects_zero_height() {
        let value = json!({ "blockHeight": 0 });
        assert!(parse_payload(Category::Blockchain, None, &value).is_err());
        let value = json!({ "blockHeight": 820_000 });
        assert!(parse_payload(Category::Blockchain, None, &value).is_ok());
    }
}
