//! Tick ingestion: raw feed messages to canonical `TickEvent`s.
//!
//! Two message classes arrive from upstream: a historical backfill batch and
//! single live quotes. Live quotes for a symbol that still awaits its
//! backfill are parked in a `BackfillGate` and released, in order, right
//! after the backfill has been applied.

use std::collections::VecDeque;

use serde::Deserialize;

use crate::error::{ScannerError, ScannerResult};
use crate::model::tick::TickEvent;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackfillBatch {
    pub symbol: String,
    pub timestamps: Vec<u64>,
    pub prices: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LiveQuote {
    pub symbol: String,
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Upstream boundary message. JSON form is tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Backfill(BackfillBatch),
    Live(LiveQuote),
    /// Upstream dropped the symbol; its pipeline is flushed and released.
    Forget { symbol: String },
}

impl FeedMessage {
    pub fn live(symbol: impl Into<String>, timestamp_ms: u64, price: f64) -> Self {
        Self::Live(LiveQuote {
            symbol: symbol.into(),
            timestamp_ms: Some(timestamp_ms),
            price: Some(price),
        })
    }

    pub fn backfill(symbol: impl Into<String>, timestamps: Vec<u64>, prices: Vec<f64>) -> Self {
        Self::Backfill(BackfillBatch {
            symbol: symbol.into(),
            timestamps,
            prices,
        })
    }

    /// Raw symbol as sent upstream.
    pub fn symbol(&self) -> &str {
        match self {
            Self::Backfill(b) => &b.symbol,
            Self::Live(q) => &q.symbol,
            Self::Forget { symbol } => symbol,
        }
    }
}

/// Last millisecond of year 9999. Anything later cannot be a real trade time
/// and would overflow bucket arithmetic.
pub const MAX_TIMESTAMP_MS: u64 = 253_402_300_799_999;

fn validate_timestamp(symbol: &str, timestamp_ms: Option<u64>) -> ScannerResult<u64> {
    match timestamp_ms {
        None => Err(ScannerError::MalformedTick {
            symbol: symbol.to_string(),
            reason: "missing timestamp".to_string(),
        }),
        Some(ts) if ts > MAX_TIMESTAMP_MS => Err(ScannerError::MalformedTick {
            symbol: symbol.to_string(),
            reason: format!("timestamp {} out of range", ts),
        }),
        Some(ts) => Ok(ts),
    }
}

pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

fn validate_price(symbol: &str, price: Option<f64>) -> ScannerResult<f64> {
    match price {
        None => Err(ScannerError::MalformedTick {
            symbol: symbol.to_string(),
            reason: "missing price".to_string(),
        }),
        Some(p) if !p.is_finite() => Err(ScannerError::MalformedTick {
            symbol: symbol.to_string(),
            reason: format!("non-finite price {}", p),
        }),
        Some(p) if p <= 0.0 => Err(ScannerError::MalformedTick {
            symbol: symbol.to_string(),
            reason: format!("non-positive price {}", p),
        }),
        Some(p) => Ok(p),
    }
}

pub fn normalize_live(quote: &LiveQuote) -> ScannerResult<TickEvent> {
    let symbol = normalize_symbol(&quote.symbol);
    if symbol.is_empty() {
        return Err(ScannerError::MalformedTick {
            symbol,
            reason: "missing symbol".to_string(),
        });
    }
    let price = validate_price(&symbol, quote.price)?;
    let timestamp_ms = validate_timestamp(&symbol, quote.timestamp_ms)?;
    Ok(TickEvent::new(symbol, price, timestamp_ms))
}

/// Normalized backfill ticks sorted by timestamp, plus the count of
/// discarded entries (bad prices, out-of-range timestamps or unpaired
/// timestamps/prices).
pub fn normalize_backfill(batch: &BackfillBatch) -> (Vec<TickEvent>, usize) {
    let symbol = normalize_symbol(&batch.symbol);
    let paired = batch.timestamps.len().min(batch.prices.len());
    let mut malformed = batch.timestamps.len().max(batch.prices.len()) - paired;
    let mut ticks = Vec::with_capacity(paired);
    for (&ts, &price) in batch.timestamps.iter().zip(batch.prices.iter()) {
        let checked = validate_timestamp(&symbol, Some(ts))
            .and_then(|ts| validate_price(&symbol, Some(price)).map(|p| (ts, p)));
        match checked {
            Ok((ts, p)) => ticks.push(TickEvent::new(symbol.clone(), p, ts)),
            Err(e) => {
                malformed += 1;
                tracing::debug!(error = %e, "Dropping backfill entry");
            }
        }
    }
    ticks.sort_by_key(|t| t.timestamp_ms);
    (ticks, malformed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    AwaitingBackfill,
    Open,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Process the tick now.
    Forward(TickEvent),
    /// Parked until the backfill arrives.
    Buffered,
    /// Parked; the oldest parked tick was evicted to stay within capacity.
    BufferedEvicted,
}

/// Orders backfill ahead of live ticks for one symbol.
#[derive(Debug, Clone)]
pub struct BackfillGate {
    state: GateState,
    pending: VecDeque<TickEvent>,
    max_pending: usize,
}

/// Ticks released by `BackfillGate::apply_backfill`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillRelease {
    /// Backfill ticks followed by parked live ticks, in processing order.
    pub ticks: Vec<TickEvent>,
    /// Backfill entries dropped because they overlap data already seen.
    pub overlapping: usize,
}

impl BackfillGate {
    pub fn new(expect_backfill: bool, max_pending: usize) -> Self {
        Self {
            state: if expect_backfill {
                GateState::AwaitingBackfill
            } else {
                GateState::Open
            },
            pending: VecDeque::new(),
            max_pending: max_pending.max(1),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == GateState::Open
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn on_live(&mut self, tick: TickEvent) -> GateDecision {
        if self.is_open() {
            return GateDecision::Forward(tick);
        }
        let mut evicted = false;
        if self.pending.len() >= self.max_pending {
            let _ = self.pending.pop_front();
            evicted = true;
        }
        self.pending.push_back(tick);
        if evicted {
            GateDecision::BufferedEvicted
        } else {
            GateDecision::Buffered
        }
    }

    /// Merge a normalized, sorted backfill and open the gate.
    ///
    /// Backfill entries are kept only when strictly older than the first
    /// parked live tick and strictly newer than `last_processed_ms`; the
    /// rest overlap data already received and would be double-counted.
    pub fn apply_backfill(
        &mut self,
        backfill: Vec<TickEvent>,
        last_processed_ms: Option<u64>,
    ) -> BackfillRelease {
        let first_live = self.pending.front().map(|t| t.timestamp_ms);
        let total = backfill.len();
        let mut ticks: Vec<TickEvent> = backfill
            .into_iter()
            .filter(|t| first_live.map_or(true, |live| t.timestamp_ms < live))
            .filter(|t| last_processed_ms.map_or(true, |last| t.timestamp_ms > last))
            .collect();
        let overlapping = total - ticks.len();
        ticks.extend(self.pending.drain(..));
        self.state = GateState::Open;
        BackfillRelease { ticks, overlapping }
    }

    /// Release parked ticks without a backfill (upstream gave up on it).
    pub fn open(&mut self) -> Vec<TickEvent> {
        self.state = GateState::Open;
        self.pending.drain(..).collect()
    }
}
