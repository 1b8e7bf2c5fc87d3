/// A single normalized price observation for one symbol.
///
/// Produced once per feed message by the ingestion adapter and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub symbol: String,
    pub price: f64,
    /// Exchange timestamp in epoch milliseconds.
    pub timestamp_ms: u64,
}

impl TickEvent {
    pub fn new(symbol: impl Into<String>, price: f64, timestamp_ms: u64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp_ms,
        }
    }

    /// Exchange timestamp in fractional seconds, used for velocity.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ms as f64 / 1_000.0
    }
}
