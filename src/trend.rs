//! Multi-timeframe trend scoring over a fixed cascade of tick-count windows.
//!
//! A single capped price history is shared by all timeframes. Each
//! timeframe keeps rolling counters of up/down moves and of absolute move
//! size over its own window, so strength and quality are O(1) per tick;
//! confidence reads a fixed number of segment endpoints.

use std::collections::VecDeque;

use serde::Serialize;

use crate::model::analysis::TimeframeMomentum;
use crate::model::signal::TrendDirection;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeframeSpec {
    pub name: &'static str,
    /// Window length in samples.
    pub period: usize,
    pub weight: f64,
    /// Minimum absolute percent change for a directional call.
    pub threshold_pct: f64,
}

/// Canonical cascade, longest to shortest. Weights sum to 1.0 and longer
/// windows use the smaller rate threshold.
pub const CASCADE: [TimeframeSpec; 4] = [
    TimeframeSpec {
        name: "5m",
        period: 300,
        weight: 0.40,
        threshold_pct: 0.020,
    },
    TimeframeSpec {
        name: "3m",
        period: 180,
        weight: 0.30,
        threshold_pct: 0.030,
    },
    TimeframeSpec {
        name: "1m",
        period: 60,
        weight: 0.20,
        threshold_pct: 0.050,
    },
    TimeframeSpec {
        name: "30s",
        period: 30,
        weight: 0.10,
        threshold_pct: 0.080,
    },
];

/// Sub-segments used for confidence.
pub const CONFIDENCE_SEGMENTS: usize = 5;
/// Timeframes that must agree for a directional consensus.
pub const CONSENSUS_MIN_AGREEING: usize = 3;
/// Alignment reported when no consensus exists.
pub const MIXED_ALIGNMENT: f64 = 25.0;
/// A shorter timeframe must keep this share of the longer one's score.
pub const CASCADE_PERSISTENCE: f64 = 0.70;

/// Cross-timeframe aggregate for one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSummary {
    pub timeframes: Vec<TimeframeMomentum>,
    pub consensus: TrendDirection,
    pub alignment: f64,
    pub weighted_score: f64,
    pub cascade_strength: f64,
}

#[derive(Debug, Clone)]
struct TimeframeTracker {
    spec: TimeframeSpec,
    ups: usize,
    downs: usize,
    abs_sum: f64,
}

impl TimeframeTracker {
    fn new(spec: TimeframeSpec) -> Self {
        Self {
            spec,
            ups: 0,
            downs: 0,
            abs_sum: 0.0,
        }
    }

    fn add(&mut self, delta: f64) {
        if delta > 0.0 {
            self.ups += 1;
        } else if delta < 0.0 {
            self.downs += 1;
        }
        self.abs_sum += delta.abs();
    }

    fn remove(&mut self, delta: f64) {
        if delta > 0.0 {
            self.ups = self.ups.saturating_sub(1);
        } else if delta < 0.0 {
            self.downs = self.downs.saturating_sub(1);
        }
        self.abs_sum = (self.abs_sum - delta.abs()).max(0.0);
    }
}

#[derive(Debug, Clone)]
pub struct TrendScorer {
    prices: VecDeque<f64>,
    capacity: usize,
    trackers: Vec<TimeframeTracker>,
}

impl TrendScorer {
    /// `specs` must be ordered longest to shortest.
    pub fn new(specs: &[TimeframeSpec]) -> Self {
        let longest = specs.iter().map(|s| s.period).max().unwrap_or(2);
        // One extra price so the move leaving the longest window is still readable.
        let capacity = longest + 2;
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
            trackers: specs.iter().copied().map(TimeframeTracker::new).collect(),
        }
    }

    pub fn push(&mut self, price: f64) {
        self.prices.push_back(price);
        let len = self.prices.len();
        if len >= 2 {
            let delta = self.prices[len - 1] - self.prices[len - 2];
            for tracker in &mut self.trackers {
                tracker.add(delta);
                let period = tracker.spec.period;
                if len >= period + 2 {
                    let leaving = self.prices[len - 1 - period] - self.prices[len - 2 - period];
                    tracker.remove(leaving);
                }
            }
        }
        while self.prices.len() > self.capacity {
            let _ = self.prices.pop_front();
        }
    }

    pub fn samples(&self) -> usize {
        self.prices.len()
    }

    pub fn reset(&mut self) {
        self.prices.clear();
        for tracker in &mut self.trackers {
            *tracker = TimeframeTracker::new(tracker.spec);
        }
    }

    fn evaluate(&self, tracker: &TimeframeTracker) -> TimeframeMomentum {
        let spec = tracker.spec;
        let len = self.prices.len();
        if len < spec.period + 1 {
            return TimeframeMomentum::insufficient(spec.name, spec.period, spec.weight);
        }
        let start = len - 1 - spec.period;
        let first = self.prices[start];
        let last = self.prices[len - 1];
        let rate_of_change = (last - first) / first.abs().max(f64::EPSILON) * 100.0;

        let direction = if rate_of_change >= spec.threshold_pct {
            TrendDirection::Bullish
        } else if rate_of_change <= -spec.threshold_pct {
            TrendDirection::Bearish
        } else {
            TrendDirection::Neutral
        };

        let directional = tracker.ups + tracker.downs;
        let agreeing = match direction {
            TrendDirection::Bullish => tracker.ups,
            TrendDirection::Bearish => tracker.downs,
            TrendDirection::Neutral => 0,
        };
        let strength = if directional > 0 {
            agreeing as f64 / directional as f64 * 100.0
        } else {
            0.0
        };

        let mut matching_segments = 0;
        if direction.is_directional() {
            for seg in 0..CONFIDENCE_SEGMENTS {
                let a = start + seg * spec.period / CONFIDENCE_SEGMENTS;
                let b = start + (seg + 1) * spec.period / CONFIDENCE_SEGMENTS;
                let seg_change = self.prices[b] - self.prices[a];
                if seg_change * direction.sign() > 0.0 {
                    matching_segments += 1;
                }
            }
        }
        let confidence = matching_segments as f64 / CONFIDENCE_SEGMENTS as f64 * 100.0;

        let avg_abs_change = tracker.abs_sum / spec.period as f64;
        let avg_change_bps = avg_abs_change / last.abs().max(f64::EPSILON) * 10_000.0;
        let trend_quality = 100.0 / (1.0 + avg_change_bps);

        let momentum_score = if direction.is_directional() {
            let rate_component = (rate_of_change.abs() / spec.threshold_pct * 25.0).min(100.0);
            let magnitude = 0.40 * rate_component + 0.35 * strength + 0.25 * confidence;
            direction.sign() * magnitude.clamp(0.0, 100.0)
        } else {
            0.0
        };

        TimeframeMomentum {
            name: spec.name,
            period: spec.period,
            direction,
            rate_of_change,
            strength,
            confidence,
            weight: spec.weight,
            momentum_score,
            trend_quality,
            sufficient_data: true,
        }
    }

    pub fn timeframes(&self) -> Vec<TimeframeMomentum> {
        self.trackers.iter().map(|t| self.evaluate(t)).collect()
    }

    pub fn summarize(&self) -> TrendSummary {
        let timeframes = self.timeframes();
        let (consensus, alignment) = consensus(&timeframes);
        TrendSummary {
            consensus,
            alignment,
            weighted_score: weighted_score(&timeframes),
            cascade_strength: cascade_strength(&timeframes),
            timeframes,
        }
    }
}

/// Majority vote with a minimum of `CONSENSUS_MIN_AGREEING` timeframes.
/// Returns the consensus and its alignment in 0..100.
pub fn consensus(timeframes: &[TimeframeMomentum]) -> (TrendDirection, f64) {
    let total = timeframes.len();
    if total == 0 {
        return (TrendDirection::Neutral, MIXED_ALIGNMENT);
    }
    let bullish = timeframes
        .iter()
        .filter(|tf| tf.direction == TrendDirection::Bullish)
        .count();
    let bearish = timeframes
        .iter()
        .filter(|tf| tf.direction == TrendDirection::Bearish)
        .count();
    let alignment = |agreeing: usize| agreeing as f64 / total as f64 * 100.0;

    if bullish >= CONSENSUS_MIN_AGREEING && bullish > bearish {
        (TrendDirection::Bullish, alignment(bullish))
    } else if bearish >= CONSENSUS_MIN_AGREEING && bearish > bullish {
        (TrendDirection::Bearish, alignment(bearish))
    } else {
        (TrendDirection::Neutral, MIXED_ALIGNMENT)
    }
}

pub fn weighted_score(timeframes: &[TimeframeMomentum]) -> f64 {
    timeframes
        .iter()
        .map(|tf| tf.momentum_score * tf.weight)
        .sum()
}

/// Share of adjacent (longer, shorter) pairs that keep the same
/// directional call and at least `CASCADE_PERSISTENCE` of the score.
pub fn cascade_strength(timeframes: &[TimeframeMomentum]) -> f64 {
    if timeframes.len() < 2 {
        return 0.0;
    }
    let pairs = timeframes.len() - 1;
    let persisting = timeframes
        .windows(2)
        .filter(|pair| {
            let (longer, shorter) = (&pair[0], &pair[1]);
            longer.direction.is_directional()
                && longer.direction == shorter.direction
                && shorter.momentum_score.abs()
                    >= CASCADE_PERSISTENCE * longer.momentum_score.abs()
        })
        .count();
    persisting as f64 / pairs as f64
}
