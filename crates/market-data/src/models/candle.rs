use serde::{Deserialize, Serialize};

use super::Timeframe;

/// One OHLCV bar. `time` is the bucket start in unix seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Candle {
    /// True when every field is finite and positive (volume may be zero)
    /// and the high/low envelope covers open and close.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        self.time > 0
            && prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

/// A single price observation, already converted to unix seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
    pub volume: f64,
}

/// Drops malformed candles, sorts ascending by time, keeps only strictly
/// increasing timestamps (first occurrence wins) and truncates to the most
/// recent `max_candles`.
pub fn clean_and_sort(candles: Vec<Candle>, max_candles: Option<usize>) -> Vec<Candle> {
    let total = candles.len();
    let mut valid: Vec<Candle> = candles.into_iter().filter(Candle::is_well_formed).collect();
    if valid.len() < total {
        log::debug!(
            "Dropped {} malformed candles out of {}",
            total - valid.len(),
            total
        );
    }

    valid.sort_by_key(|c| c.time);
    valid.dedup_by_key(|c| c.time);

    if let Some(max) = max_candles {
        if valid.len() > max {
            valid.drain(..valid.len() - max);
        }
    }
    valid
}

/// Groups raw price points into timeframe buckets and builds one candle per
/// bucket.
///
/// Open is the previous bucket's close (or the first price of the first
/// bucket), close is the last price in time order, high/low span every price
/// in the bucket widened to cover open and close, volume is the bucket sum.
/// The result still needs [`clean_and_sort`] for truncation.
pub fn aggregate_price_points(mut points: Vec<PricePoint>, timeframe: Timeframe) -> Vec<Candle> {
    points.retain(|p| p.price.is_finite() && p.price > 0.0);
    points.sort_by_key(|p| p.timestamp);

    let mut candles: Vec<Candle> = Vec::new();
    let mut previous_close: Option<f64> = None;
    let mut idx = 0;

    while idx < points.len() {
        let bucket = timeframe.bucket_start(points[idx].timestamp);
        let mut end = idx;
        while end < points.len() && timeframe.bucket_start(points[end].timestamp) == bucket {
            end += 1;
        }
        let group = &points[idx..end];

        let open = previous_close.unwrap_or(group[0].price);
        let close = group[group.len() - 1].price;
        let (high, low) = group.iter().fold((open.max(close), open.min(close)), |(h, l), p| {
            (h.max(p.price), l.min(p.price))
        });
        let volume = group
            .iter()
            .map(|p| if p.volume.is_finite() && p.volume > 0.0 { p.volume } else { 0.0 })
            .sum();

        candles.push(Candle {
            time: bucket,
            open,
            high,
            low,
            close,
            volume,
        });
        previous_close = Some(close);
        idx = end;
    }

    candles
}
