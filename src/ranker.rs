//! Turns per-symbol analyses into a bounded, ordered recommendation list.
//!
//! The list is rebuilt from scratch on every scan and swapped in whole;
//! readers between scans get the previous list unchanged.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::RankerConfig;
use crate::model::analysis::MultiTimeframeAnalysis;
use crate::model::recommendation::Recommendation;
use crate::model::signal::{Tier, TrendDirection, VolatilityTier};

/// Why a symbol was left out of the list. Each gate is reported on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    InsufficientData,
    Stale { age_ms: u64 },
    NoConsensus,
    Alignment { value: f64 },
    Momentum { value: f64 },
    LongestConfidence { value: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData => write!(f, "insufficient data"),
            Self::Stale { age_ms } => write!(f, "analysis is {}ms old", age_ms),
            Self::NoConsensus => write!(f, "no timeframe consensus"),
            Self::Alignment { value } => write!(f, "alignment {:.1} below threshold", value),
            Self::Momentum { value } => write!(f, "momentum {:.1} below threshold", value),
            Self::LongestConfidence { value } => {
                write!(f, "longest timeframe confidence {:.1} below minimum", value)
            }
        }
    }
}

/// Volatility class of a symbol: configured override first, then the index
/// number in synthetic-index names (`R_75`, `1HZ100V`), else medium.
pub fn volatility_tier(symbol: &str, overrides: &HashMap<String, VolatilityTier>) -> VolatilityTier {
    if let Some(tier) = overrides.get(symbol) {
        return *tier;
    }
    let digits = if let Some(rest) = symbol.strip_prefix("R_") {
        rest
    } else if let Some(rest) = symbol.strip_prefix("1HZ") {
        rest.trim_end_matches('V')
    } else {
        ""
    };
    match digits.parse::<u32>() {
        Ok(n) if n <= 25 => VolatilityTier::Low,
        Ok(n) if n <= 50 => VolatilityTier::Medium,
        Ok(_) => VolatilityTier::High,
        Err(_) => VolatilityTier::Medium,
    }
}

/// Suggested contract length in ticks. Calmer instruments and stronger
/// trends get longer holds.
pub fn suggested_duration_ticks(volatility: VolatilityTier, tier: Tier) -> u32 {
    match (volatility, tier) {
        (VolatilityTier::Low, Tier::Strong) => 10,
        (VolatilityTier::Low, Tier::Weak) => 7,
        (VolatilityTier::Medium, Tier::Strong) => 7,
        (VolatilityTier::Medium, Tier::Weak) => 5,
        (VolatilityTier::High, Tier::Strong) => 5,
        (VolatilityTier::High, Tier::Weak) => 3,
    }
}

/// Descending confidence, then symbol name.
pub fn compare_recommendations(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

pub struct Ranker {
    config: RankerConfig,
    latest: Arc<Vec<Recommendation>>,
    last_scan_ms: Option<u64>,
}

impl Ranker {
    pub fn new(config: RankerConfig) -> Self {
        Self {
            config,
            latest: Arc::new(Vec::new()),
            last_scan_ms: None,
        }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Apply every gate to one analysis.
    pub fn evaluate(
        &self,
        analysis: &MultiTimeframeAnalysis,
        now_ms: u64,
    ) -> Result<Recommendation, RejectReason> {
        let cfg = &self.config;
        if !analysis.data_ready() {
            return Err(RejectReason::InsufficientData);
        }
        let longest = analysis.longest().ok_or(RejectReason::InsufficientData)?;
        let age_ms = now_ms.saturating_sub(analysis.computed_at_ms);
        if age_ms > cfg.max_analysis_age_ms {
            return Err(RejectReason::Stale { age_ms });
        }
        if !analysis.consensus.is_directional() {
            return Err(RejectReason::NoConsensus);
        }
        if analysis.alignment < cfg.alignment_threshold {
            return Err(RejectReason::Alignment {
                value: analysis.alignment,
            });
        }
        let momentum = analysis.momentum_strength();
        if momentum < cfg.momentum_threshold {
            return Err(RejectReason::Momentum { value: momentum });
        }
        if longest.confidence < cfg.min_longest_confidence {
            return Err(RejectReason::LongestConfidence {
                value: longest.confidence,
            });
        }

        // Strict bounds: a value sitting exactly on a bound stays weak.
        let tier = if longest.strength > cfg.strong_strength
            && longest.confidence > cfg.strong_confidence
            && analysis.cascade_strength > cfg.strong_cascade
        {
            Tier::Strong
        } else {
            Tier::Weak
        };

        let confidence = (0.4 * analysis.alignment
            + 0.3 * longest.confidence
            + 0.3 * analysis.cascade_strength * 100.0)
            .clamp(0.0, 100.0);
        let volatility = volatility_tier(&analysis.symbol, &cfg.volatility_overrides);

        Ok(Recommendation {
            symbol: analysis.symbol.clone(),
            direction: analysis.consensus,
            tier,
            confidence,
            score: analysis.weighted_score,
            volatility,
            suggested_duration_ticks: suggested_duration_ticks(volatility, tier),
            reason: reason(analysis),
            timestamp_ms: now_ms,
        })
    }

    /// Rebuild the list from the given analyses and publish it as latest.
    pub fn rank<'a, I>(&mut self, analyses: I, now_ms: u64) -> Arc<Vec<Recommendation>>
    where
        I: IntoIterator<Item = &'a MultiTimeframeAnalysis>,
    {
        let mut list: Vec<Recommendation> = Vec::new();
        for analysis in analyses {
            match self.evaluate(analysis, now_ms) {
                Ok(rec) => list.push(rec),
                Err(reason) => {
                    tracing::trace!(symbol = %analysis.symbol, %reason, "Symbol not trade-ready");
                }
            }
        }
        list.sort_by(compare_recommendations);
        list.truncate(self.config.max_recommendations);

        self.latest = Arc::new(list);
        self.last_scan_ms = Some(now_ms);
        Arc::clone(&self.latest)
    }

    /// Last published list; unchanged between scans.
    pub fn latest(&self) -> Arc<Vec<Recommendation>> {
        Arc::clone(&self.latest)
    }

    pub fn top(&self, count: usize) -> Vec<Recommendation> {
        self.latest.iter().take(count).cloned().collect()
    }

    pub fn last_scan_ms(&self) -> Option<u64> {
        self.last_scan_ms
    }

    pub fn clear(&mut self) {
        self.latest = Arc::new(Vec::new());
    }
}

fn reason(analysis: &MultiTimeframeAnalysis) -> String {
    let agreeing = analysis
        .timeframes
        .iter()
        .filter(|tf| tf.direction == analysis.consensus)
        .count();
    let longest_roc = analysis
        .longest()
        .map(|tf| tf.rate_of_change)
        .unwrap_or(0.0);
    let mut out = format!(
        "{} on {}/{} timeframes, cascade {:.0}%, longest ROC {:+.3}%",
        analysis.consensus,
        agreeing,
        analysis.timeframes.len(),
        analysis.cascade_strength * 100.0,
        longest_roc,
    );
    if analysis.scorer.bias != TrendDirection::Neutral {
        let agrees = if analysis.scorer.bias == analysis.consensus {
            "confirms"
        } else {
            "disagrees"
        };
        out.push_str(&format!(
            ", indicator vote {} ({:.0})",
            agrees, analysis.scorer.score
        ));
    }
    out
}
