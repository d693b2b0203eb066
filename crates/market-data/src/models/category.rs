use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A kind of data the service refreshes on its own cadence.
///
/// Each category selects which providers are eligible and which cache
/// fields an update touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Spot price, 24h change, volume and market cap.
    Market,
    /// Candles for a single timeframe.
    Ohlc,
    /// Chain tip height.
    Blockchain,
    /// Circulating/max supply and the extended supply record.
    Supply,
    /// Global market figures, including BTC dominance.
    Global,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Market,
        Category::Ohlc,
        Category::Blockchain,
        Category::Supply,
        Category::Global,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Market => "market",
            Category::Ohlc => "ohlc",
            Category::Blockchain => "blockchain",
            Category::Supply => "supply",
            Category::Global => "global",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(Category::Market),
            "ohlc" => Ok(Category::Ohlc),
            "blockchain" => Ok(Category::Blockchain),
            "supply" => Ok(Category::Supply),
            "global" => Ok(Category::Global),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}
