use serde::Serialize;

use super::{BlockchainData, Candle, Category, GlobalData, MarketData, SupplyData, Timeframe};

/// What the scheduler asks the provider manager for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchRequest {
    Market,
    Ohlc(Timeframe),
    Blockchain,
    Supply,
    Global,
}

impl FetchRequest {
    pub fn category(&self) -> Category {
        match self {
            FetchRequest::Market => Category::Market,
            FetchRequest::Ohlc(_) => Category::Ohlc,
            FetchRequest::Blockchain => Category::Blockchain,
            FetchRequest::Supply => Category::Supply,
            FetchRequest::Global => Category::Global,
        }
    }
}

/// Normalized payload for one category.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "category", content = "data", rename_all = "lowercase")]
pub enum CategoryData {
    Market(MarketData),
    Ohlc {
        timeframe: Timeframe,
        candles: Vec<Candle>,
    },
    Blockchain(BlockchainData),
    Supply(SupplyData),
    Global(GlobalData),
}

impl CategoryData {
    pub fn category(&self) -> Category {
        match self {
            CategoryData::Market(_) => Category::Market,
            CategoryData::Ohlc { .. } => Category::Ohlc,
            CategoryData::Blockchain(_) => Category::Blockchain,
            CategoryData::Supply(_) => Category::Supply,
            CategoryData::Global(_) => Category::Global,
        }
    }
}

/// A successful fetch together with the id of the provider that served it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FetchResult {
    pub data: CategoryData,
    pub source: String,
}
