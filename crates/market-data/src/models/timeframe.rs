use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Candle bucket width.
///
/// Serialized with the chart labels clients use (`"5M"`, `"1H"`, ...).
/// OHLC refresh walks [`Timeframe::ALL`] cyclically via [`Timeframe::next`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "5M")]
    FiveMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "4H")]
    FourHours,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
}

/// Upper bound on candles kept per timeframe.
pub const MAX_CANDLES: usize = 50;

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::FiveMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::OneDay,
        Timeframe::OneWeek,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::FiveMinutes => "5M",
            Timeframe::OneHour => "1H",
            Timeframe::FourHours => "4H",
            Timeframe::OneDay => "1D",
            Timeframe::OneWeek => "1W",
        }
    }

    /// Bucket width in seconds.
    pub fn bucket_seconds(&self) -> i64 {
        match self {
            Timeframe::FiveMinutes => 300,
            Timeframe::OneHour => 3_600,
            Timeframe::FourHours => 14_400,
            Timeframe::OneDay => 86_400,
            Timeframe::OneWeek => 604_800,
        }
    }

    pub fn max_candles(&self) -> usize {
        MAX_CANDLES
    }

    /// Start of the bucket containing `timestamp` (unix seconds).
    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        let width = self.bucket_seconds();
        timestamp - timestamp.rem_euclid(width)
    }

    /// The timeframe after this one, wrapping from 1W back to 5M.
    pub fn next(&self) -> Timeframe {
        let idx = Self::ALL.iter().position(|tf| tf == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// `days` parameter for CoinGecko's `market_chart` endpoint.
    pub fn coingecko_days(&self) -> &'static str {
        match self {
            Timeframe::FiveMinutes => "0.5",
            Timeframe::OneHour => "3",
            Timeframe::FourHours => "10",
            Timeframe::OneDay => "60",
            Timeframe::OneWeek => "365",
        }
    }

    /// Binance kline interval.
    pub fn binance_interval(&self) -> &'static str {
        match self {
            Timeframe::FiveMinutes => "5m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|tf| tf.label() == upper)
            .ok_or_else(|| format!("Unknown timeframe: {}", s))
    }
}
