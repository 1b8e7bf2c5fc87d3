use serde::Serialize;

use super::signal::{MomentumDirection, TrendDirection};

/// Which sample stream an indicator set was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StatsTimeframe {
    /// Every accepted tick.
    Tick,
    /// Closes of completed candles of the given interval.
    Candle(u64),
}

/// Read-only view of one `IndicatorState`.
///
/// Indicators below their minimum sample count report neutral defaults:
/// zero for averages and momentum, 50 for RSI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub timeframe: StatsTimeframe,
    pub samples: u64,
    pub sma: f64,
    pub hull: f64,
    pub hull_slope: f64,
    pub kama: f64,
    pub rsi: f64,
    pub momentum: f64,
    pub smoothed_momentum: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub momentum_direction: MomentumDirection,
    /// True once every indicator has passed its warm-up threshold.
    pub ready: bool,
}

/// Momentum of a single cascade timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeMomentum {
    pub name: &'static str,
    pub period: usize,
    pub direction: TrendDirection,
    /// Percent change over the window.
    pub rate_of_change: f64,
    /// 0..100
    pub strength: f64,
    /// 0..100
    pub confidence: f64,
    pub weight: f64,
    /// Signed: positive for bullish, negative for bearish, 0 when neutral.
    pub momentum_score: f64,
    /// 0..100, higher for smoother price paths.
    pub trend_quality: f64,
    pub sufficient_data: bool,
}

impl TimeframeMomentum {
    /// Neutral placeholder used until the window has filled.
    pub fn insufficient(name: &'static str, period: usize, weight: f64) -> Self {
        Self {
            name,
            period,
            direction: TrendDirection::Neutral,
            rate_of_change: 0.0,
            strength: 0.0,
            confidence: 0.0,
            weight,
            momentum_score: 0.0,
            trend_quality: 0.0,
            sufficient_data: false,
        }
    }
}

/// Output of the deterministic momentum scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScorerOutput {
    pub bias: TrendDirection,
    /// 0..100
    pub score: f64,
}

/// Per-symbol snapshot handed to consumers. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiTimeframeAnalysis {
    pub symbol: String,
    /// Exchange time of the last tick folded in.
    pub timestamp_ms: u64,
    /// Local wall-clock time the snapshot was built.
    pub computed_at_ms: u64,
    pub last_price: f64,
    /// Ordered longest to shortest.
    pub timeframes: Vec<TimeframeMomentum>,
    pub consensus: TrendDirection,
    /// 0..100
    pub alignment: f64,
    pub weighted_score: f64,
    /// 0..1
    pub cascade_strength: f64,
    pub indicators: Vec<IndicatorSnapshot>,
    pub scorer: ScorerOutput,
}

impl MultiTimeframeAnalysis {
    pub fn longest(&self) -> Option<&TimeframeMomentum> {
        self.timeframes.first()
    }

    /// All cascade windows have filled.
    pub fn data_ready(&self) -> bool {
        !self.timeframes.is_empty() && self.timeframes.iter().all(|tf| tf.sufficient_data)
    }

    /// Magnitude of the weighted momentum score.
    pub fn momentum_strength(&self) -> f64 {
        self.weighted_score.abs()
    }

    pub fn tick_indicators(&self) -> Option<&IndicatorSnapshot> {
        self.indicators
            .iter()
            .find(|s| s.timeframe == StatsTimeframe::Tick)
    }
}
