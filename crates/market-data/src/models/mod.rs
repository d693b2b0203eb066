//! Market data models
//!
//! - `category` - The five refresh categories (Category)
//! - `timeframe` - Candle bucket widths and provider parameters (Timeframe)
//! - `candle` - OHLCV bars, bucketing and clean-up (Candle, PricePoint)
//! - `market` - Normalized market, blockchain, supply and global records
//! - `request` - Fetch requests and their results (FetchRequest, FetchResult)

mod candle;
mod category;
mod market;
mod request;
mod timeframe;

pub use candle::{aggregate_price_points, clean_and_sort, Candle, PricePoint};
pub use category::Category;
pub use market::{
    format_supply_percentage, round_to, BlockchainData, ExtendedSupplyData, GlobalData,
    GlobalMarketData, MarketData, SupplyData, SupplyInfo, BTC_MAX_SUPPLY,
};
pub use request::{CategoryData, FetchRequest, FetchResult};
pub use timeframe::{Timeframe, MAX_CANDLES};
