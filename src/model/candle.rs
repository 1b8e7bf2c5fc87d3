use serde::Serialize;

/// Immutable OHLC snapshot of a closed bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_time: u64,
    pub close_time: u64,
    pub tick_count: u32,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    pub fn interval_ms(&self) -> u64 {
        self.close_time - self.open_time
    }
}

/// Aggregates ticks into a single open candle over a fixed bucket.
///
/// The bucket is derived from the tick timestamp only, so the same tick log
/// always yields the same candles.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleBuilder {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_time: u64,
    pub close_time: u64,
    pub tick_count: u32,
    pub last_update: u64,
}

/// Start of the bucket containing `timestamp_ms`.
pub fn bucket_start(timestamp_ms: u64, interval_ms: u64) -> u64 {
    timestamp_ms - (timestamp_ms % interval_ms)
}

impl CandleBuilder {
    /// Start a new candle. The bucket is aligned to the interval. `None`
    /// when the bucket end does not fit in a `u64`.
    pub fn new(symbol: &str, price: f64, timestamp_ms: u64, interval_ms: u64) -> Option<Self> {
        assert!(interval_ms > 0, "interval_ms must be > 0");
        let open_time = bucket_start(timestamp_ms, interval_ms);
        let close_time = open_time.checked_add(interval_ms)?;
        Some(Self {
            symbol: symbol.to_string(),
            open: price,
            high: price,
            low: price,
            close: price,
            open_time,
            close_time,
            tick_count: 1,
            last_update: timestamp_ms,
        })
    }

    /// Update the candle with a new trade price.
    pub fn update(&mut self, price: f64, timestamp_ms: u64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.tick_count = self.tick_count.saturating_add(1);
        self.last_update = timestamp_ms;
    }

    /// Check if a timestamp belongs to this candle's time bucket.
    pub fn contains(&self, timestamp_ms: u64) -> bool {
        timestamp_ms >= self.open_time && timestamp_ms < self.close_time
    }

    /// Finalize into an immutable Candle.
    pub fn finish(&self) -> Candle {
        Candle {
            symbol: self.symbol.clone(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            open_time: self.open_time,
            close_time: self.close_time,
            tick_count: self.tick_count,
        }
    }
}
