use trend_scanner::model::analysis::TimeframeMomentum;
use trend_scanner::model::signal::TrendDirection;
use trend_scanner::trend::{
    cascade_strength, consensus, weighted_score, TimeframeSpec, TrendScorer, CASCADE,
    MIXED_ALIGNMENT,
};

/// Single 10-sample timeframe: five segments of two moves each.
const TEN: TimeframeSpec = TimeframeSpec {
    name: "10t",
    period: 10,
    weight: 1.0,
    threshold_pct: 0.02,
};

fn score_window(prices: &[f64]) -> TimeframeMomentum {
    let mut scorer = TrendScorer::new(&[TEN]);
    for &p in prices {
        scorer.push(p);
    }
    scorer.timeframes().remove(0)
}

fn tf(direction: TrendDirection, score: f64) -> TimeframeMomentum {
    let mut m = TimeframeMomentum::insufficient("t", 10, 0.25);
    m.direction = direction;
    m.momentum_score = score;
    m.sufficient_data = true;
    m
}

#[test]
fn full_agreement_is_full_alignment() {
    let tfs = vec![tf(TrendDirection::Bullish, 80.0); 4];
    let (dir, alignment) = consensus(&tfs);
    assert_eq!(dir, TrendDirection::Bullish);
    assert!((alignment - 100.0).abs() < f64::EPSILON);
}

#[test]
/// Two of four is not a consensus; its alignment is the fixed mixed value,
/// below any three- or four-way agreement.
fn two_of_four_is_mixed() {
    use TrendDirection::*;
    let split = vec![tf(Bullish, 50.0), tf(Bullish, 50.0), tf(Bearish, -50.0), tf(Bearish, -50.0)];
    let (dir, alignment) = consensus(&split);
    assert_eq!(dir, Neutral);
    assert!((alignment - MIXED_ALIGNMENT).abs() < f64::EPSILON);

    let half_neutral = vec![tf(Bullish, 50.0), tf(Bullish, 50.0), tf(Neutral, 0.0), tf(Neutral, 0.0)];
    assert_eq!(consensus(&half_neutral), (Neutral, MIXED_ALIGNMENT));

    let three = vec![tf(Bearish, -50.0), tf(Bearish, -50.0), tf(Bearish, -50.0), tf(Bullish, 50.0)];
    let (dir, three_alignment) = consensus(&three);
    assert_eq!(dir, Bearish);
    assert!((three_alignment - 75.0).abs() < f64::EPSILON);
    assert!(alignment < three_alignment);
}

#[test]
fn cascade_requires_persistence_down_the_ladder() {
    use TrendDirection::*;
    let persistent = vec![tf(Bullish, 80.0), tf(Bullish, 70.0), tf(Bullish, 60.0), tf(Bullish, 90.0)];
    assert!((cascade_strength(&persistent) - 1.0).abs() < f64::EPSILON);

    // 3m keeps 70/80, 1m only 30/70, 30s flips.
    let fading = vec![tf(Bullish, 80.0), tf(Bullish, 70.0), tf(Bullish, 30.0), tf(Bearish, -40.0)];
    assert!((cascade_strength(&fading) - 1.0 / 3.0).abs() < 1e-12);

    assert_eq!(cascade_strength(&[tf(Bullish, 10.0)]), 0.0);
}

#[test]
fn weighted_score_sums_weighted_momentum() {
    use TrendDirection::*;
    let tfs = vec![tf(Bullish, 40.0), tf(Bearish, -20.0)];
    // weights are 0.25 each
    assert!((weighted_score(&tfs) - 5.0).abs() < 1e-12);
}

#[test]
fn scorer_reports_insufficient_until_window_fills() {
    let mut scorer = TrendScorer::new(&CASCADE);
    for i in 0..300 {
        scorer.push(100.0 + i as f64 * 0.01);
    }
    let tfs = scorer.timeframes();
    assert_eq!(tfs[0].name, "5m");
    assert!(!tfs[0].sufficient_data);
    assert_eq!(tfs[0].direction, TrendDirection::Neutral);
    assert!(tfs[1..].iter().all(|t| t.sufficient_data));

    scorer.push(103.0);
    assert!(scorer.timeframes().iter().all(|t| t.sufficient_data));
}

#[test]
/// A clean ramp is bullish on every timeframe with maximal scores.
fn steady_ramp_is_fully_aligned() {
    let mut scorer = TrendScorer::new(&CASCADE);
    for i in 0..400 {
        scorer.push(100.0 + i as f64 * 0.05);
    }
    let summary = scorer.summarize();
    assert_eq!(summary.consensus, TrendDirection::Bullish);
    assert!((summary.alignment - 100.0).abs() < f64::EPSILON);
    assert!((summary.cascade_strength - 1.0).abs() < f64::EPSILON);
    for t in &summary.timeframes {
        assert!((t.strength - 100.0).abs() < f64::EPSILON);
        assert!((t.confidence - 100.0).abs() < f64::EPSILON);
        assert!((t.momentum_score - 100.0).abs() < 1e-9);
        assert!(t.trend_quality > 0.0 && t.trend_quality <= 100.0);
    }
    assert!((summary.weighted_score - 100.0).abs() < 1e-9);
}

#[test]
fn falling_series_is_bearish_with_negative_score() {
    let mut scorer = TrendScorer::new(&CASCADE);
    for i in 0..400 {
        scorer.push(200.0 - i as f64 * 0.02);
    }
    let summary = scorer.summarize();
    assert_eq!(summary.consensus, TrendDirection::Bearish);
    assert!(summary.weighted_score < -90.0);
}

#[test]
/// Rolling up/down counters agree with a direct recount of the window.
fn rolling_strength_matches_recount() {
    let mut seed: u64 = 7;
    let mut next = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) as f64 / (1u64 << 31) as f64 - 0.45
    };

    let mut scorer = TrendScorer::new(&CASCADE);
    let mut prices = Vec::new();
    let mut price = 1_000.0;
    for _ in 0..2_000 {
        price += next();
        prices.push(price);
        scorer.push(price);
    }

    for t in scorer.timeframes() {
        let window = &prices[prices.len() - 1 - t.period..];
        let deltas: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
        let ups = deltas.iter().filter(|d| **d > 0.0).count();
        let downs = deltas.iter().filter(|d| **d < 0.0).count();
        let expected = match t.direction {
            TrendDirection::Bullish => ups as f64 / (ups + downs) as f64 * 100.0,
            TrendDirection::Bearish => downs as f64 / (ups + downs) as f64 * 100.0,
            TrendDirection::Neutral => 0.0,
        };
        assert!((t.strength - expected).abs() < 1e-9, "{}: {} vs {}", t.name, t.strength, expected);

        let roc = (window[window.len() - 1] - window[0]) / window[0] * 100.0;
        assert!((t.rate_of_change - roc).abs() < 1e-9);
    }
}

#[test]
/// Confidence is the share of the five segments that move with the call.
fn confidence_counts_agreeing_segments() {
    // Segments: +2, +2, -1, +2, +2.
    let four = [100.0, 101.0, 102.0, 103.0, 104.0, 103.5, 103.0, 104.0, 105.0, 106.0, 107.0];
    let t = score_window(&four);
    assert_eq!(t.direction, TrendDirection::Bullish);
    assert!((t.confidence - 80.0).abs() < 1e-9);

    // Segments: +2, +2, -1, -1, +6.
    let three = [100.0, 101.0, 102.0, 103.0, 104.0, 103.5, 103.0, 102.5, 102.0, 104.0, 108.0];
    let t = score_window(&three);
    assert_eq!(t.direction, TrendDirection::Bullish);
    assert!((t.confidence - 60.0).abs() < 1e-9);
    assert!((t.strength - 60.0).abs() < 1e-9);
}

#[test]
/// With the same net move, the smoother path has the higher quality; a flat
/// window has the maximum.
fn smoother_path_scores_higher_quality() {
    let smooth: Vec<f64> = (0..=10).map(|i| 100.0 + i as f64).collect();
    let choppy = [100.0, 103.0, 102.0, 105.0, 104.0, 107.0, 106.0, 109.0, 108.0, 111.0, 110.0];
    let smooth = score_window(&smooth);
    let choppy = score_window(&choppy);
    assert!((smooth.rate_of_change - choppy.rate_of_change).abs() < 1e-9);
    assert!(smooth.trend_quality > choppy.trend_quality);
    assert!(choppy.trend_quality > 0.0);

    let flat = score_window(&[50.0; 11]);
    assert_eq!(flat.direction, TrendDirection::Neutral);
    assert!((flat.trend_quality - 100.0).abs() < 1e-9);
}
