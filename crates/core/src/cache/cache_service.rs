use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;

use btcpulse_market_data::{
    BlockchainData, Candle, Category, CategoryData, FetchResult, GlobalData, MarketData,
    SupplyData, Timeframe,
};

use super::cache_model::{
    CacheCleanupReport, CacheConfig, CacheMemoryInfo, CacheSnapshot, CacheStats,
    DataAvailability, UpdateHistoryEntry,
};
use super::cache_schema::{parse_payload, validate_payload};
use crate::constants::RECENT_HISTORY_IN_STATS;

struct CacheState {
    snapshot: CacheSnapshot,
    history: VecDeque<UpdateHistoryEntry>,
    last_update_times: HashMap<Category, DateTime<Utc>>,
    update_counter: u64,
    last_cleanup: DateTime<Utc>,
}

impl CacheState {
    fn new() -> Self {
        Self {
            snapshot: CacheSnapshot::default(),
            history: VecDeque::new(),
            last_update_times: HashMap::new(),
            update_counter: 0,
            last_cleanup: Utc::now(),
        }
    }
}

/// In-memory holder of the latest value for every published field.
///
/// All `update_*` methods validate first and return `true` only when a
/// field actually changed. Invalid payloads are logged and dropped without
/// touching the cache.
pub struct SnapshotCache {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(mut config: CacheConfig) -> Self {
        config.max_history = config.max_history.max(1);
        Self {
            state: Mutex::new(CacheState::new()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Snapshot cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Merges a manager result. Returns whether anything changed.
    pub fn apply(&self, result: &FetchResult) -> bool {
        self.apply_data(&result.data, &result.source)
    }

    fn apply_data(&self, data: &CategoryData, source: &str) -> bool {
        match data {
            CategoryData::Market(market) => self.update_market_data(market, source),
            CategoryData::Ohlc { timeframe, candles } => {
                self.update_ohlc_data(*timeframe, candles, source)
            }
            CategoryData::Blockchain(chain) => self.update_blockchain_data(chain, source),
            CategoryData::Supply(supply) => self.update_supply_data(supply, source),
            CategoryData::Global(global) => self.update_global_data(global, source),
        }
    }

    /// Decodes a raw JSON payload and merges it.
    pub fn update_from_value(
        &self,
        category: Category,
        timeframe: Option<Timeframe>,
        value: &Value,
        source: &str,
    ) -> bool {
        match parse_payload(category, timeframe, value) {
            Ok(data) => self.apply_data(&data, source),
            Err(e) => {
                warn!("Rejected {} payload from {}: {}", category, source, e);
                false
            }
        }
    }

    fn accepts(&self, data: &CategoryData, source: &str) -> bool {
        match validate_payload(data) {
            Ok(()) => true,
            Err(e) => {
                warn!("Rejected {} payload from {}: {}", data.category(), source, e);
                false
            }
        }
    }

    pub fn update_market_data(&self, market: &MarketData, source: &str) -> bool {
        if !self.accepts(&CategoryData::Market(*market), source) {
            return false;
        }
        let mut state = self.lock_state();
        let snapshot = &mut state.snapshot;
        let mut fields = Vec::new();
        set_if_changed(
            &mut snapshot.current_price,
            market.current_price,
            "currentPrice",
            &mut fields,
        );
        set_if_changed(
            &mut snapshot.price_change,
            market.price_change,
            "priceChange",
            &mut fields,
        );
        set_if_changed(&mut snapshot.volume, market.volume, "volume", &mut fields);
        set_if_changed(
            &mut snapshot.market_cap,
            market.market_cap,
            "marketCap",
            &mut fields,
        );
        self.record_update(&mut state, Category::Market, None, source, fields)
    }

    pub fn update_ohlc_data(&self, timeframe: Timeframe, candles: &[Candle], source: &str) -> bool {
        let data = CategoryData::Ohlc {
            timeframe,
            candles: candles.to_vec(),
        };
        if !self.accepts(&data, source) {
            return false;
        }
        let mut state = self.lock_state();
        let series = state.snapshot.ohlc_data.entry(timeframe).or_default();
        let mut fields = Vec::new();
        if series.as_slice() != candles {
            *series = candles.to_vec();
            fields.push("ohlcData");
        }
        self.record_update(&mut state, Category::Ohlc, Some(timeframe), source, fields)
    }

    pub fn update_blockchain_data(&self, chain: &BlockchainData, source: &str) -> bool {
        if !self.accepts(&CategoryData::Blockchain(*chain), source) {
            return false;
        }
        let mut state = self.lock_state();
        let mut fields = Vec::new();
        set_if_changed(
            &mut state.snapshot.block_height,
            chain.block_height,
            "blockHeight",
            &mut fields,
        );
        self.record_update(&mut state, Category::Blockchain, None, source, fields)
    }

    /// A payload without extended data keeps the extended data already cached.
    pub fn update_supply_data(&self, supply: &SupplyData, source: &str) -> bool {
        if !self.accepts(&CategoryData::Supply(supply.clone()), source) {
            return false;
        }
        let mut state = self.lock_state();
        let snapshot = &mut state.snapshot;
        let mut fields = Vec::new();
        set_if_changed(
            &mut snapshot.total_supply,
            supply.total_supply.clone(),
            "totalSupply",
            &mut fields,
        );
        if let Some(ext) = &supply.extended_supply_data {
            set_if_changed(
                &mut snapshot.extended_supply_data,
                ext.clone(),
                "extendedSupplyData",
                &mut fields,
            );
        }
        self.record_update(&mut state, Category::Supply, None, source, fields)
    }

    pub fn update_global_data(&self, global: &GlobalData, source: &str) -> bool {
        if !self.accepts(&CategoryData::Global(global.clone()), source) {
            return false;
        }
        let mut state = self.lock_state();
        let snapshot = &mut state.snapshot;
        let mut fields = Vec::new();
        if let Some(dominance) = global.market_dominance {
            set_if_changed(
                &mut snapshot.market_dominance,
                dominance,
                "marketDominance",
                &mut fields,
            );
        }
        set_if_changed(
            &mut snapshot.global_market_data,
            global.global_market_data.clone(),
            "globalMarketData",
            &mut fields,
        );
        self.record_update(&mut state, Category::Global, None, source, fields)
    }

    /// Sets the timeframe clients should chart. Not recorded in history.
    pub fn update_current_timeframe(&self, timeframe: Timeframe) -> bool {
        let mut state = self.lock_state();
        if state.snapshot.current_timeframe == timeframe {
            return false;
        }
        debug!(
            "Current timeframe {} -> {}",
            state.snapshot.current_timeframe, timeframe
        );
        state.snapshot.current_timeframe = timeframe;
        true
    }

    pub fn current_timeframe(&self) -> Timeframe {
        self.lock_state().snapshot.current_timeframe
    }

    /// Copy of the merged view.
    pub fn snapshot(&self) -> CacheSnapshot {
        self.lock_state().snapshot.clone()
    }

    pub fn candles(&self, timeframe: Timeframe) -> Vec<Candle> {
        self.lock_state().snapshot.candles(timeframe).to_vec()
    }

    /// Full update history, oldest first.
    pub fn history(&self) -> Vec<UpdateHistoryEntry> {
        self.lock_state().history.iter().cloned().collect()
    }

    pub fn last_update_time(&self, category: Category) -> Option<DateTime<Utc>> {
        self.lock_state().last_update_times.get(&category).copied()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        let snapshot = &state.snapshot;
        let ohlc_candle_counts = snapshot
            .ohlc_data
            .iter()
            .map(|(tf, candles)| (*tf, candles.len()))
            .collect();
        let total_candles = snapshot.ohlc_data.values().map(Vec::len).sum();
        let skip = state.history.len().saturating_sub(RECENT_HISTORY_IN_STATS);

        CacheStats {
            data_availability: DataAvailability {
                market_data: snapshot.has_market_data(),
                blockchain_data: snapshot.block_height.is_some(),
                supply_data: snapshot.total_supply.is_some(),
                global_data: snapshot.global_market_data.is_some(),
                ohlc_data: total_candles > 0,
            },
            ohlc_candle_counts,
            current_timeframe: snapshot.current_timeframe,
            last_update: snapshot.last_update,
            data_source: snapshot.data_source.clone(),
            last_update_times: state
                .last_update_times
                .iter()
                .map(|(c, t)| (*c, *t))
                .collect(),
            recent_updates: state.history.iter().skip(skip).cloned().collect(),
            memory: CacheMemoryInfo {
                history_entries: state.history.len(),
                history_capacity: self.config.max_history,
                tracked_categories: state.last_update_times.len(),
                total_candles,
                update_counter: state.update_counter,
                last_cleanup: state.last_cleanup,
            },
        }
    }

    /// Trims history, prunes stale per-category timestamps and resets the
    /// update counter when it grew past its ceiling.
    pub fn cleanup(&self) -> CacheCleanupReport {
        self.cleanup_at(Utc::now())
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) -> CacheCleanupReport {
        let mut state = self.lock_state();
        let mut report = CacheCleanupReport::default();

        let excess = state.history.len().saturating_sub(self.config.max_history);
        state.history.drain(..excess);
        report.history_trimmed = excess;

        let retention = chrono::Duration::from_std(self.config.update_retention)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let before = state.last_update_times.len();
        state
            .last_update_times
            .retain(|_, updated_at| now.signed_duration_since(*updated_at) <= retention);
        report.timestamps_pruned = before - state.last_update_times.len();

        state.last_cleanup = now;

        info!(
            "Cache cleanup: {} history entries trimmed, {} timestamps pruned",
            report.history_trimmed, report.timestamps_pruned
        );
        report
    }

    /// Drops all data, keeping the configuration.
    pub fn clear(&self) {
        *self.lock_state() = CacheState::new();
        info!("Snapshot cache cleared");
    }

    /// Appends a history entry when `fields` is non-empty.
    fn record_update(
        &self,
        state: &mut CacheState,
        category: Category,
        timeframe: Option<Timeframe>,
        source: &str,
        fields: Vec<&'static str>,
    ) -> bool {
        if fields.is_empty() {
            debug!("{} update from {} changed nothing", category, source);
            return false;
        }

        let now = Utc::now();
        state.update_counter = if state.update_counter >= self.config.counter_ceiling {
            1
        } else {
            state.update_counter + 1
        };
        state.history.push_back(UpdateHistoryEntry {
            id: state.update_counter,
            timestamp: now,
            category,
            timeframe,
            source: source.to_string(),
            fields,
        });
        while state.history.len() > self.config.max_history {
            state.history.pop_front();
        }
        state.last_update_times.insert(category, now);
        state.snapshot.last_update = Some(now);
        state.snapshot.data_source = Some(source.to_string());
        true
    }
}

fn set_if_changed<T: PartialEq>(
    slot: &mut Option<T>,
    value: T,
    field: &'static str,
    fields: &mut Vec<&'static str>,
) {
    if slot.as_ref() != Some(&value) {
        *slot = Some(value);
        fields.push(field);
    }
}
