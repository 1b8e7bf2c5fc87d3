//! Candle reconstruction: deterministic bucketing of ticks into fixed
//! interval OHLC candles with a capped history per interval.

use std::collections::VecDeque;

use crate::error::{ScannerError, ScannerResult};
use crate::model::candle::{bucket_start, Candle, CandleBuilder};
use crate::model::tick::TickEvent;

fn unbucketable(tick: &TickEvent) -> ScannerError {
    ScannerError::MalformedTick {
        symbol: tick.symbol.clone(),
        reason: format!("timestamp {} cannot be bucketed", tick.timestamp_ms),
    }
}

/// One interval's open buffer and its ring of completed candles.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    interval_ms: u64,
    max_len: usize,
    open: Option<CandleBuilder>,
    /// Start of the most recently finalized bucket. Never reopened.
    last_closed: Option<u64>,
    completed: VecDeque<Candle>,
}

impl CandleSeries {
    pub fn new(interval_ms: u64, max_len: usize) -> Self {
        assert!(interval_ms > 0, "interval_ms must be > 0");
        let max_len = max_len.max(1);
        Self {
            interval_ms,
            max_len,
            open: None,
            last_closed: None,
            completed: VecDeque::with_capacity(max_len),
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Reject ticks whose bucket cannot be represented, precedes the open
    /// bucket or falls in an already finalized one. Never mutates.
    pub fn check(&self, tick: &TickEvent) -> ScannerResult<()> {
        let bucket = bucket_start(tick.timestamp_ms, self.interval_ms);
        if bucket.checked_add(self.interval_ms).is_none() {
            return Err(unbucketable(tick));
        }
        let late = |open_start: u64| ScannerError::LateTick {
            symbol: tick.symbol.clone(),
            bucket_start: bucket,
            open_start,
        };
        if let Some(open) = &self.open {
            if bucket < open.open_time {
                return Err(late(open.open_time));
            }
        }
        if let Some(closed) = self.last_closed {
            if bucket <= closed {
                return Err(late(closed));
            }
        }
        Ok(())
    }

    /// Apply a tick. Returns the candle it closed, if any.
    pub fn on_tick(&mut self, tick: &TickEvent) -> ScannerResult<Option<Candle>> {
        self.check(tick)?;
        let mut closed = None;
        let same_bucket = self.open.as_ref().map(|o| o.contains(tick.timestamp_ms));
        match same_bucket {
            Some(true) => {
                if let Some(open) = self.open.as_mut() {
                    open.update(tick.price, tick.timestamp_ms);
                }
            }
            Some(false) => {
                let next = self.start(tick)?;
                closed = self.finalize();
                self.open = Some(next);
            }
            None => self.open = Some(self.start(tick)?),
        }
        Ok(closed)
    }

    fn start(&self, tick: &TickEvent) -> ScannerResult<CandleBuilder> {
        CandleBuilder::new(&tick.symbol, tick.price, tick.timestamp_ms, self.interval_ms)
            .ok_or_else(|| unbucketable(tick))
    }

    fn finalize(&mut self) -> Option<Candle> {
        let candle = self.open.take()?.finish();
        self.last_closed = Some(candle.open_time);
        if self.completed.len() >= self.max_len {
            let _ = self.completed.pop_front();
        }
        self.completed.push_back(candle.clone());
        Some(candle)
    }

    /// Force-close the open buffer. A second call is a no-op.
    pub fn flush(&mut self) -> Option<Candle> {
        self.finalize()
    }

    pub fn open_candle(&self) -> Option<&CandleBuilder> {
        self.open.as_ref()
    }

    /// Completed candles, oldest first. Empty before the first close.
    pub fn candles(&self) -> Vec<Candle> {
        self.completed.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

/// All candle series of one symbol.
#[derive(Debug, Clone)]
pub struct SymbolCandles {
    series: Vec<CandleSeries>,
}

impl SymbolCandles {
    pub fn new(intervals_ms: &[u64], max_len: usize) -> Self {
        Self {
            series: intervals_ms
                .iter()
                .map(|&ms| CandleSeries::new(ms, max_len))
                .collect(),
        }
    }

    /// Apply a tick to every interval. A late or unbucketable tick for any
    /// interval is rejected before any series is touched.
    pub fn on_tick(&mut self, tick: &TickEvent) -> ScannerResult<Vec<Candle>> {
        for series in &self.series {
            series.check(tick)?;
        }
        let mut closed = Vec::new();
        for series in &mut self.series {
            if let Some(candle) = series.on_tick(tick)? {
                closed.push(candle);
            }
        }
        Ok(closed)
    }

    pub fn flush(&mut self) -> Vec<Candle> {
        self.series.iter_mut().filter_map(|s| s.flush()).collect()
    }

    pub fn series(&self, interval_ms: u64) -> Option<&CandleSeries> {
        self.series.iter().find(|s| s.interval_ms == interval_ms)
    }

    pub fn candles(&self, interval_ms: u64) -> Vec<Candle> {
        self.series(interval_ms)
            .map(CandleSeries::candles)
            .unwrap_or_default()
    }
}
