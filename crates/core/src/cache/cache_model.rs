use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use btcpulse_market_data::{
    Candle, Category, ExtendedSupplyData, GlobalMarketData, SupplyInfo, Timeframe,
};

use crate::constants::{MAX_HISTORY_ENTRIES, UPDATE_COUNTER_CEILING, UPDATE_TIME_RETENTION};

/// The merged view pushed to clients.
///
/// Field names match what dashboard clients already consume, so this is
/// serialized as-is by the API and the websocket broadcaster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub current_price: Option<f64>,
    pub price_change: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub block_height: Option<u64>,
    pub market_dominance: Option<f64>,
    pub total_supply: Option<SupplyInfo>,
    pub extended_supply_data: Option<ExtendedSupplyData>,
    pub global_market_data: Option<GlobalMarketData>,
    /// Always carries one (possibly empty) series per timeframe.
    pub ohlc_data: BTreeMap<Timeframe, Vec<Candle>>,
    pub current_timeframe: Timeframe,
    pub last_update: Option<DateTime<Utc>>,
    pub data_source: Option<String>,
}

impl Default for CacheSnapshot {
    fn default() -> Self {
        Self {
            current_price: None,
            price_change: None,
            volume: None,
            market_cap: None,
            block_height: None,
            market_dominance: None,
            total_supply: None,
            extended_supply_data: None,
            global_market_data: None,
            ohlc_data: Timeframe::ALL.iter().map(|tf| (*tf, Vec::new())).collect(),
            current_timeframe: Timeframe::default(),
            last_update: None,
            data_source: None,
        }
    }
}

impl CacheSnapshot {
    pub fn has_market_data(&self) -> bool {
        self.current_price.is_some()
    }

    pub fn candles(&self, timeframe: Timeframe) -> &[Candle] {
        self.ohlc_data
            .get(&timeframe)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// One accepted change to the cache.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHistoryEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    pub source: String,
    /// Snapshot fields that changed.
    pub fields: Vec<&'static str>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAvailability {
    pub market_data: bool,
    pub blockchain_data: bool,
    pub supply_data: bool,
    pub global_data: bool,
    pub ohlc_data: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMemoryInfo {
    pub history_entries: usize,
    pub history_capacity: usize,
    pub tracked_categories: usize,
    pub total_candles: usize,
    pub update_counter: u64,
    pub last_cleanup: DateTime<Utc>,
}

/// Diagnostics view of the cache.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub data_availability: DataAvailability,
    pub ohlc_candle_counts: BTreeMap<Timeframe, usize>,
    pub current_timeframe: Timeframe,
    pub last_update: Option<DateTime<Utc>>,
    pub data_source: Option<String>,
    pub last_update_times: BTreeMap<Category, DateTime<Utc>>,
    /// Newest last.
    pub recent_updates: Vec<UpdateHistoryEntry>,
    pub memory: CacheMemoryInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCleanupReport {
    pub history_trimmed: usize,
    pub timestamps_pruned: usize,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub max_history: usize,
    pub update_retention: Duration,
    pub counter_ceiling: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_history: MAX_HISTORY_ENTRIES,
            update_retention: UPDATE_TIME_RETENTION,
            counter_ceiling: UPDATE_COUNTER_CEILING,
        }
    }
}
