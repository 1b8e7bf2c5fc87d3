//! Deterministic momentum scorers.
//!
//! These stand where a learned model might sit, but carry no trained
//! parameters: each is a plain function of one `IndicatorSnapshot`.

use crate::model::analysis::{IndicatorSnapshot, ScorerOutput};
use crate::model::signal::{MomentumDirection, TrendDirection};

pub trait MomentumScorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, snapshot: &IndicatorSnapshot) -> ScorerOutput;
}

/// Four-voter ensemble over tick indicators:
///
/// 1. Hull slope sign
/// 2. smoothed momentum direction
/// 3. RSI zone (above `rsi_upper` bullish, below `rsi_lower` bearish)
/// 4. Hull above/below the plain SMA
///
/// Bias needs a net vote of at least `min_net_votes`; score is the share of
/// voters siding with the bias.
#[derive(Debug, Clone)]
pub struct IndicatorVoteScorer {
    pub rsi_lower: f64,
    pub rsi_upper: f64,
    pub min_net_votes: i32,
}

const VOTERS: f64 = 4.0;

impl Default for IndicatorVoteScorer {
    fn default() -> Self {
        Self {
            rsi_lower: 45.0,
            rsi_upper: 55.0,
            min_net_votes: 2,
        }
    }
}

fn vote(v: f64) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

impl MomentumScorer for IndicatorVoteScorer {
    fn name(&self) -> &'static str {
        "indicator-vote"
    }

    fn score(&self, snapshot: &IndicatorSnapshot) -> ScorerOutput {
        if !snapshot.ready {
            return ScorerOutput {
                bias: TrendDirection::Neutral,
                score: 0.0,
            };
        }

        let votes = [
            vote(snapshot.hull_slope),
            match snapshot.momentum_direction {
                MomentumDirection::Increasing => 1,
                MomentumDirection::Decreasing => -1,
                MomentumDirection::Flat => 0,
            },
            if snapshot.rsi > self.rsi_upper {
                1
            } else if snapshot.rsi < self.rsi_lower {
                -1
            } else {
                0
            },
            vote(snapshot.hull - snapshot.sma),
        ];
        let net: i32 = votes.iter().sum();

        let bias = if net >= self.min_net_votes {
            TrendDirection::Bullish
        } else if net <= -self.min_net_votes {
            TrendDirection::Bearish
        } else {
            TrendDirection::Neutral
        };
        let siding = match bias {
            TrendDirection::Bullish => votes.iter().filter(|v| **v > 0).count(),
            TrendDirection::Bearish => votes.iter().filter(|v| **v < 0).count(),
            TrendDirection::Neutral => 0,
        };
        ScorerOutput {
            bias,
            score: siding as f64 / VOTERS * 100.0,
        }
    }
}
