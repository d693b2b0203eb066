//! Provider payload validation.
//!
//! Checks normalized payloads before the manager accepts them:
//! - Prices are finite and positive, within a sanity bound
//! - Candle series are non-empty and well formed
//! - Block height and supply figures are plausible
//! - Dominance is a percentage
//!
//! A hard failure counts against the provider and triggers fallback.

use log::warn;

use crate::errors::MarketDataError;
use crate::models::{Candle, CategoryData, GlobalData, MarketData, SupplyData};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject payload, try next provider.
    Hard,
    /// Soft warning - accept payload but log warning.
    Soft,
}

/// Validation result details.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Description of the issue.
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message: message.into(),
        }
    }

    fn soft(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message: message.into(),
        }
    }
}

/// Payload validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Maximum plausible BTC price in USD.
    pub max_price: f64,
    /// Whether to warn when a provider reports no market cap.
    pub warn_on_missing_market_cap: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_price: 100_000_000.0,
            warn_on_missing_market_cap: true,
        }
    }
}

/// Validates normalized payloads from providers.
pub struct PayloadValidator {
    config: ValidatorConfig,
}

impl PayloadValidator {
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Returns Ok(()) if the payload is usable. Warnings are logged only.
    pub fn validate(&self, source: &str, data: &CategoryData) -> Result<(), MarketDataError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        match data {
            CategoryData::Market(market) => self.validate_market(market, &mut issues),
            CategoryData::Ohlc { candles, .. } => self.validate_candles(candles, &mut issues),
            CategoryData::Blockchain(chain) => {
                if chain.block_height == 0 {
                    issues.push(ValidationIssue::hard("Block height is zero"));
                }
            }
            CategoryData::Supply(supply) => self.validate_supply(supply, &mut issues),
            CategoryData::Global(global) => self.validate_global(global, &mut issues),
        }

        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::ValidationFailed {
                message: format!("{} {}: {}", source, data.category(), errors.join("; ")),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!(
                "Payload validation warning for '{}' {}: {}",
                source,
                data.category(),
                issue.message
            );
        }

        Ok(())
    }

    fn validate_market(&self, market: &MarketData, issues: &mut Vec<ValidationIssue>) {
        let price = market.current_price;
        if !price.is_finite() || price <= 0.0 {
            issues.push(ValidationIssue::hard(format!("Invalid price: {}", price)));
        } else if price > self.config.max_price {
            issues.push(ValidationIssue::hard(format!(
                "Price {} exceeds sanity bound {}",
                price, self.config.max_price
            )));
        }

        for (name, value) in [
            ("priceChange", market.price_change),
            ("volume", market.volume),
            ("marketCap", market.market_cap),
        ] {
            if !value.is_finite() {
                issues.push(ValidationIssue::hard(format!("{} is not finite", name)));
            }
        }

        if market.volume < 0.0 || market.market_cap < 0.0 {
            issues.push(ValidationIssue::hard("Negative volume or market cap"));
        }

        if self.config.warn_on_missing_market_cap && market.market_cap == 0.0 {
            issues.push(ValidationIssue::soft("Market cap not provided"));
        }
    }

    fn validate_candles(&self, candles: &[Candle], issues: &mut Vec<ValidationIssue>) {
        if candles.is_empty() {
            issues.push(ValidationIssue::hard("No candles returned"));
            return;
        }
        if let Some(bad) = candles.iter().find(|c| !c.is_well_formed()) {
            issues.push(ValidationIssue::hard(format!(
                "Malformed candle at {}",
                bad.time
            )));
        }
        if candles.windows(2).any(|w| w[0].time >= w[1].time) {
            issues.push(ValidationIssue::hard("Candle times are not strictly increasing"));
        }
    }

    fn validate_supply(&self, supply: &SupplyData, issues: &mut Vec<ValidationIssue>) {
        let info = &supply.total_supply;
        if !info.current.is_finite() || info.current <= 0.0 {
            issues.push(ValidationIssue::hard(format!(
                "Invalid current supply: {}",
                info.current
            )));
        }
        if !info.max.is_finite() || info.max <= 0.0 {
            issues.push(ValidationIssue::hard(format!("Invalid max supply: {}", info.max)));
        } else if info.current > info.max {
            issues.push(ValidationIssue::soft("Current supply exceeds max supply"));
        }
    }

    fn validate_global(&self, global: &GlobalData, issues: &mut Vec<ValidationIssue>) {
        let data = &global.global_market_data;
        if let Some(dominance) = data.btc_dominance {
            if !(0.0..=100.0).contains(&dominance) {
                issues.push(ValidationIssue::hard(format!(
                    "Dominance {} is not a percentage",
                    dominance
                )));
            }
        }
        if data.btc_dominance.is_none()
            && data.total_market_cap.is_none()
            && data.total_volume.is_none()
        {
            issues.push(ValidationIssue::hard("Global response carried no figures"));
        }
    }
}

impl Default for PayloadValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockchainData, GlobalMarketData, SupplyInfo, Timeframe};

    fn market(price: f64) -> CategoryData {
        CategoryData::Market(MarketData {
            current_price: price,
            price_change: 1.0,
            volume: 10.0,
            market_cap: 100.0,
        })
    }

    #[test]
    fn test_valid_market_passes() {
        assert!(PayloadValidator::new().validate("coingecko", &market(45000.0)).is_ok());
    }

    #[test]
    fn test_zero_or_nan_price_fails() {
        let validator = PayloadValidator::new();
        assert!(validator.validate("coincap", &market(0.0)).is_err());
        assert!(validator.validate("coincap", &market(f64::NAN)).is_err());
        assert!(validator.validate("coincap", &market(1e12)).is_err());
    }

    #[test]
    fn test_missing_market_cap_is_only_a_warning() {
        let data = CategoryData::Market(MarketData {
            current_price: 45000.0,
            price_change: 0.0,
            volume: 1.0,
            market_cap: 0.0,
        });
        assert!(PayloadValidator::new().validate("binance", &data).is_ok());
    }

    #[test]
    fn test_empty_candles_fail() {
        let data = CategoryData::Ohlc {
            timeframe: Timeframe::OneDay,
            candles: vec![],
        };
        let err = PayloadValidator::new().validate("binance", &data).unwrap_err();
        assert!(err.to_string().contains("No candles returned"));
    }

    #[test]
    fn test_zero_block_height_fails() {
        let data = CategoryData::Blockchain(BlockchainData { block_height: 0 });
        assert!(PayloadValidator::new().validate("blockstream", &data).is_err());
    }

    #[test]
    fn test_supply_and_global_checks() {
        let validator = PayloadValidator::new();
        let supply = CategoryData::Supply(SupplyData {
            total_supply: SupplyInfo::new(19_500_000.0, 21_000_000.0),
            extended_supply_data: None,
        });
        assert!(validator.validate("coingecko", &supply).is_ok());

        let bad_global = CategoryData::Global(GlobalData {
            market_dominance: Some(152.0),
            global_market_data: GlobalMarketData {
                btc_dominance: Some(152.0),
                ..GlobalMarketData::default()
            },
        });
        assert!(validator.validate("coingecko", &bad_global).is_err());

        let empty_global = CategoryData::Global(GlobalData {
            market_dominance: None,
            global_market_data: GlobalMarketData::default(),
        });
        assert!(validator.validate("coingecko", &empty_global).is_err());
    }
}
