use serde::Serialize;

use super::signal::{Tier, TrendDirection, VolatilityTier};

/// One ranked, externally consumable trade suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub symbol: String,
    pub direction: TrendDirection,
    pub tier: Tier,
    /// 0..100
    pub confidence: f64,
    /// Weighted multi-timeframe momentum score.
    pub score: f64,
    pub volatility: VolatilityTier,
    pub suggested_duration_ticks: u32,
    pub reason: String,
    pub timestamp_ms: u64,
}

impl Recommendation {
    /// Compact label such as `STRONG BULLISH`.
    pub fn label(&self) -> String {
        match self.tier {
            Tier::Strong => format!("STRONG {}", self.direction),
            Tier::Weak => self.direction.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub timestamp_ms: u64,
    pub symbol: Option<String>,
    pub kind: &'static str,
    pub message: String,
}

/// Engine health as published to status subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStatus {
    pub connected_symbols: usize,
    pub last_scan_ms: Option<u64>,
    pub average_confidence: f64,
    pub recommendation_count: usize,
    pub malformed_count: u64,
    pub out_of_order_count: u64,
    /// Live ticks dropped because their symbol's worker queue was full.
    pub dropped_count: u64,
    pub error_count: u64,
    pub recent_errors: Vec<ErrorRecord>,
}
