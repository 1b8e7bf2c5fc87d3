use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trend_scanner::config::EngineConfig;
use trend_scanner::engine::{ScannerEngine, MAX_ERROR_LOG};
use trend_scanner::error::ScannerError;
use trend_scanner::ingest::{FeedMessage, LiveQuote};
use trend_scanner::model::analysis::{IndicatorSnapshot, ScorerOutput};
use trend_scanner::model::signal::{Tier, TrendDirection};
use trend_scanner::scorer::{IndicatorVoteScorer, MomentumScorer};

const NOW: u64 = 1_700_000_000_000;

fn engine_with_intervals(intervals_ms: Vec<u64>, max_candles: usize) -> ScannerEngine {
    let config = EngineConfig {
        candle_intervals_ms: intervals_ms,
        max_candles,
        ..EngineConfig::default()
    };
    ScannerEngine::new(config).unwrap()
}

fn live(symbol: &str, ts_ms: u64, price: f64) -> FeedMessage {
    FeedMessage::live(symbol, ts_ms, price)
}

#[test]
fn ticks_close_candles_per_bucket() {
    let engine = engine_with_intervals(vec![10_000], 100);
    for (ts, price) in [(100, 1.0), (101, 2.0), (109, 3.0), (110, 4.0)] {
        engine.ingest_at(live("R_100", ts * 1_000, price), NOW).unwrap();
    }
    let candles = engine.get_candles("R_100", 10_000);
    assert_eq!(candles.len(), 1);
    assert_eq!(candles[0].open_time, 100_000);
    assert_eq!(candles[0].tick_count, 3);

    let flushed = engine.flush("R_100").unwrap();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].open_time, 110_000);
    assert_eq!(flushed[0].tick_count, 1);
    assert_eq!(engine.get_candles("R_100", 10_000).len(), 2);
    assert!(engine.get_candles("R_100", 60_000).is_empty());
}

#[test]
/// Ticks older than the last accepted one are rejected and counted;
/// equal timestamps are accepted.
fn out_of_order_ticks_are_rejected() {
    let engine = engine_with_intervals(vec![10_000], 100);
    engine.ingest_at(live("R_50", 20_000, 1.0), NOW).unwrap();
    engine.ingest_at(live("R_50", 25_000, 2.0), NOW).unwrap();

    let report = engine.ingest_at(live("R_50", 19_000, 9.0), NOW).unwrap();
    assert_eq!(report.out_of_order, 1);
    assert_eq!(report.accepted, 0);

    let report = engine.ingest_at(live("R_50", 25_000, 3.0), NOW).unwrap();
    assert_eq!(report.accepted, 1);

    let status = engine.status();
    assert_eq!(status.out_of_order_count, 1);
    assert_eq!(status.recent_errors.len(), 1);
    assert_eq!(status.recent_errors[0].kind, "input.out_of_order");
    assert_eq!(status.recent_errors[0].symbol.as_deref(), Some("R_50"));

    let flushed = engine.flush("R_50").unwrap();
    assert_eq!(flushed[0].tick_count, 3);
    assert!((flushed[0].high - 3.0).abs() < f64::EPSILON);
}

#[test]
/// Flushing or shutting down twice notifies candle subscribers once.
fn shutdown_is_idempotent() {
    let engine = engine_with_intervals(vec![60_000], 100);
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    engine.on_candle(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    engine.ingest_at(live("R_10", 1_000, 5.0), NOW).unwrap();
    let first = engine.shutdown().unwrap();
    let second = engine.shutdown().unwrap();
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert!(engine.flush("R_10").unwrap().is_empty());
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(engine.is_shut_down());

    // Input after shutdown is ignored.
    let report = engine.ingest_at(live("R_10", 2_000, 6.0), NOW).unwrap();
    assert_eq!(report.accepted, 0);
}

#[test]
fn candle_history_is_capped() {
    let engine = engine_with_intervals(vec![1_000], 3);
    for i in 0..10u64 {
        engine.ingest_at(live("R_25", i * 1_000, 10.0 + i as f64), NOW).unwrap();
    }
    let candles = engine.get_candles("R_25", 1_000);
    let opens: Vec<u64> = candles.iter().map(|c| c.open_time).collect();
    assert_eq!(opens, vec![6_000, 7_000, 8_000]);
}

#[test]
/// Live ticks that arrive before the backfill are parked; backfill entries
/// overlapping them are discarded.
fn backfill_is_applied_before_parked_live_ticks() {
    let engine = engine_with_intervals(vec![60_000], 100);
    assert!(engine.subscribe("r_75", true).unwrap());
    assert!(!engine.subscribe("R_75", true).unwrap());

    let r1 = engine.ingest_at(live("R_75", 10_000, 110.0), NOW).unwrap();
    let r2 = engine.ingest_at(live("R_75", 11_000, 111.0), NOW).unwrap();
    assert_eq!(r1.buffered + r2.buffered, 2);
    assert!(engine.get_analysis("R_75").is_none());

    let timestamps: Vec<u64> = (1..=12).map(|i| i * 1_000).collect();
    let prices: Vec<f64> = (1..=12).map(|i| 100.0 + i as f64).collect();
    let report = engine
        .ingest_at(FeedMessage::backfill("R_75", timestamps, prices), NOW)
        .unwrap();
    assert_eq!(report.overlapping, 3);
    assert_eq!(report.accepted, 9 + 2);
    assert_eq!(report.out_of_order, 0);

    let analysis = engine.get_analysis("R_75").unwrap();
    assert_eq!(analysis.timestamp_ms, 11_000);
    assert!((analysis.last_price - 111.0).abs() < f64::EPSILON);
    assert_eq!(analysis.tick_indicators().unwrap().samples, 11);
}

#[test]
fn gate_can_be_opened_without_backfill() {
    let engine = engine_with_intervals(vec![60_000], 100);
    engine.subscribe("R_75", true).unwrap();
    engine.ingest_at(live("R_75", 1_000, 1.0), NOW).unwrap();
    assert!(engine.get_analysis("R_75").is_none());

    let report = engine.open_gate("R_75").unwrap();
    assert_eq!(report.accepted, 1);
    assert!(engine.get_analysis("R_75").is_some());
    assert!(matches!(
        engine.open_gate("NOPE"),
        Err(ScannerError::UnknownSymbol(_))
    ));
}

#[test]
/// Bad input for one symbol never disturbs another.
fn symbols_are_isolated() {
    let engine = engine_with_intervals(vec![60_000], 100);
    engine.ingest_at(live("R_10", 5_000, 1.0), NOW).unwrap();
    engine.ingest_at(live("R_100", 5_000, 2.0), NOW).unwrap();

    let nan = FeedMessage::Live(LiveQuote {
        symbol: "R_10".to_string(),
        timestamp_ms: Some(6_000),
        price: Some(f64::NAN),
    });
    assert_eq!(engine.ingest_at(nan, NOW).unwrap().malformed, 1);
    engine.ingest_at(live("R_10", 1_000, 1.0), NOW).unwrap();

    let report = engine.ingest_at(live("R_100", 6_000, 3.0), NOW).unwrap();
    assert_eq!(report.accepted, 1);
    assert_eq!(engine.get_analysis("R_100").unwrap().timestamp_ms, 6_000);
    assert_eq!(engine.get_analysis("R_10").unwrap().timestamp_ms, 5_000);
    assert_eq!(engine.symbols(), vec!["R_10".to_string(), "R_100".to_string()]);

    let status = engine.status();
    assert_eq!(status.malformed_count, 1);
    assert_eq!(status.out_of_order_count, 1);
    assert_eq!(status.error_count, 2);
}

#[test]
fn malformed_backfill_entries_are_counted() {
    let engine = engine_with_intervals(vec![60_000], 100);
    let msg = FeedMessage::backfill("R_10", vec![1_000, 2_000, 3_000], vec![1.0, -2.0]);
    let report = engine.ingest_at(msg, NOW).unwrap();
    assert_eq!(report.accepted, 1);
    assert_eq!(report.malformed, 2);
    assert_eq!(engine.status().malformed_count, 2);
}

#[test]
fn error_log_is_bounded() {
    let engine = engine_with_intervals(vec![60_000], 100);
    for i in 0..(MAX_ERROR_LOG as u64 + 10) {
        let msg = FeedMessage::Live(LiveQuote {
            symbol: "R_10".to_string(),
            timestamp_ms: Some(i),
            price: None,
        });
        engine.ingest_at(msg, NOW).unwrap();
    }
    let status = engine.status();
    assert_eq!(status.recent_errors.len(), MAX_ERROR_LOG);
    assert_eq!(status.malformed_count, MAX_ERROR_LOG as u64 + 10);
}

#[test]
/// A clean uptrend becomes a strong bullish recommendation; a flat symbol
/// is left out.
fn scan_recommends_trending_symbols() {
    let engine = engine_with_intervals(vec![60_000], 100);
    for i in 0..400u64 {
        let ts = 1_000_000 + i * 1_000;
        engine.ingest_at(live("R_10", ts, 100.0 + i as f64 * 0.05), NOW).unwrap();
        engine.ingest_at(live("R_75", ts, 500.0), NOW).unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.on_recommendations(move |list| {
        sink.lock().unwrap().push(list.len());
        Ok(())
    });
    let watch = engine.watch_recommendations();

    let list = engine.run_scan(NOW + 1_000).unwrap();
    assert_eq!(list.len(), 1);
    let rec = &list[0];
    assert_eq!(rec.symbol, "R_10");
    assert_eq!(rec.direction, TrendDirection::Bullish);
    assert_eq!(rec.tier, Tier::Strong);
    assert!((rec.confidence - 100.0).abs() < 1e-9);
    assert_eq!(rec.suggested_duration_ticks, 10);

    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(watch.borrow().len(), 1);
    assert_eq!(engine.get_recommendations(5), list.as_ref().clone());

    let flat = engine.get_analysis("R_75").unwrap();
    assert_eq!(flat.consensus, TrendDirection::Neutral);
    assert!(flat.data_ready());

    let status = engine.status();
    assert_eq!(status.connected_symbols, 2);
    assert_eq!(status.last_scan_ms, Some(NOW + 1_000));
    assert_eq!(status.recommendation_count, 1);
    assert!((status.average_confidence - 100.0).abs() < 1e-9);
}

#[test]
fn stale_analysis_drops_out_of_the_list() {
    let engine = engine_with_intervals(vec![60_000], 100);
    for i in 0..400u64 {
        engine
            .ingest_at(live("R_10", i * 1_000, 100.0 + i as f64 * 0.05), NOW)
            .unwrap();
    }
    assert_eq!(engine.run_scan(NOW).unwrap().len(), 1);
    let max_age = engine.config().ranker.max_analysis_age_ms;
    assert!(engine.run_scan(NOW + max_age + 1).unwrap().is_empty());
}

#[test]
fn inactive_symbols_are_swept() {
    let engine = engine_with_intervals(vec![60_000], 100);
    let closed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&closed);
    engine.on_candle(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    engine.ingest_at(live("R_10", 1_000, 1.0), NOW).unwrap();
    engine.ingest_at(live("R_25", 1_000, 1.0), NOW + 200_000).unwrap();

    let stale_after = engine.config().scanner.stale_after_ms;
    let removed = engine.sweep_inactive(NOW + stale_after + 1).unwrap();
    assert_eq!(removed, vec!["R_10".to_string()]);
    assert_eq!(engine.symbols(), vec!["R_25".to_string()]);
    assert!(engine.get_analysis("R_10").is_none());
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn forget_message_unsubscribes() {
    let engine = engine_with_intervals(vec![60_000], 100);
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);
    engine.on_status(move |s| {
        sink.lock().unwrap().push(s.connected_symbols);
        Ok(())
    });

    engine.ingest_at(live("R_10", 1_000, 1.0), NOW).unwrap();
    engine
        .ingest_at(
            FeedMessage::Forget {
                symbol: "r_10".to_string(),
            },
            NOW,
        )
        .unwrap();
    assert!(engine.symbols().is_empty());
    assert!(!engine.unsubscribe("R_10").unwrap());
    assert_eq!(*statuses.lock().unwrap(), vec![1, 0]);
}

#[test]
/// A failing subscriber is isolated from the next one.
fn failing_candle_subscriber_does_not_block_delivery() {
    let engine = engine_with_intervals(vec![1_000], 100);
    engine.on_candle(|_| anyhow::bail!("consumer down"));
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    engine.on_candle(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    engine.ingest_at(live("R_10", 1_000, 1.0), NOW).unwrap();
    engine.ingest_at(live("R_10", 2_000, 1.0), NOW).unwrap();
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(engine.candle_events().failure_count(), 1);
}

#[test]
fn invalid_config_is_rejected() {
    let config = EngineConfig {
        candle_intervals_ms: Vec::new(),
        ..EngineConfig::default()
    };
    assert!(matches!(
        ScannerEngine::new(config),
        Err(ScannerError::Config(_))
    ));
}

#[test]
/// Reset drops indicator history but keeps the ordering guarantee.
fn reset_restarts_indicators() {
    let engine = engine_with_intervals(vec![60_000], 100);
    for i in 0..50u64 {
        engine.ingest_at(live("R_50", 1_000 + i * 1_000, 10.0 + i as f64), NOW).unwrap();
    }
    assert_eq!(engine.get_analysis("R_50").unwrap().tick_indicators().unwrap().samples, 50);

    let flushed = engine.reset("R_50").unwrap();
    assert_eq!(flushed.len(), 1);
    assert!(engine.get_analysis("R_50").is_none());
    assert_eq!(engine.get_candles("R_50", 60_000).len(), 1);

    let report = engine.ingest_at(live("R_50", 10_000, 5.0), NOW).unwrap();
    assert_eq!(report.out_of_order, 1);
    engine.ingest_at(live("R_50", 60_000, 5.0), NOW).unwrap();
    let analysis = engine.get_analysis("R_50").unwrap();
    assert_eq!(analysis.tick_indicators().unwrap().samples, 1);
    assert!(!analysis.data_ready());
    assert!(matches!(engine.reset("NOPE"), Err(ScannerError::UnknownSymbol(_))));
}

/// Scorer that panics while `armed` is set, to poison one symbol's pipeline.
#[derive(Default)]
struct TrippingScorer {
    armed: AtomicBool,
}

impl MomentumScorer for TrippingScorer {
    fn name(&self) -> &'static str {
        "tripping"
    }

    fn score(&self, snapshot: &IndicatorSnapshot) -> ScorerOutput {
        if self.armed.load(Ordering::SeqCst) {
            panic!("scorer failure");
        }
        IndicatorVoteScorer::default().score(snapshot)
    }
}

/// Engine holding a healthy `ZZZ` with an open candle and a poisoned `AAA`.
fn engine_with_poisoned_symbol() -> Arc<ScannerEngine> {
    let scorer = Arc::new(TrippingScorer::default());
    let engine = Arc::new(
        ScannerEngine::with_scorer(EngineConfig::default(), Arc::clone(&scorer) as _).unwrap(),
    );
    engine.ingest_at(live("ZZZ", NOW, 10.0), NOW).unwrap();

    scorer.armed.store(true, Ordering::SeqCst);
    let worker = Arc::clone(&engine);
    let panicked = std::thread::spawn(move || worker.ingest_at(live("AAA", NOW, 1.0), NOW))
        .join()
        .is_err();
    scorer.armed.store(false, Ordering::SeqCst);
    assert!(panicked);
    engine
}

#[test]
/// A timestamp too large to bucket is counted as malformed instead of
/// panicking inside the pipeline.
fn unbucketable_timestamp_is_malformed() {
    let engine = engine_with_intervals(vec![60_000], 100);
    let report = engine.ingest_at(live("AAA", u64::MAX, 1.0), NOW).unwrap();
    assert_eq!(report.malformed, 1);
    assert_eq!(report.accepted, 0);
    assert_eq!(engine.status().malformed_count, 1);

    let report = engine.ingest_at(live("AAA", NOW, 1.0), NOW).unwrap();
    assert_eq!(report.accepted, 1);
}

#[test]
/// Shutdown still flushes healthy symbols when another symbol's pipeline
/// was poisoned; the broken symbol is dropped.
fn poisoned_symbol_does_not_stop_shutdown() {
    let engine = engine_with_poisoned_symbol();
    assert!(matches!(
        engine.ingest_at(live("AAA", NOW + 1, 1.0), NOW),
        Err(ScannerError::PipelinePoisoned(ref s)) if s == "AAA"
    ));

    let flushed = engine.shutdown().unwrap();
    // Default config keeps 1m and 5m candles.
    assert_eq!(flushed.len(), 2);
    assert!(flushed.iter().all(|c| c.symbol == "ZZZ"));
    assert_eq!(engine.get_candles("ZZZ", 60_000).len(), 1);
    assert_eq!(engine.symbols(), vec!["ZZZ".to_string()]);

    let status = engine.status();
    assert!(status
        .recent_errors
        .iter()
        .any(|e| e.symbol.as_deref() == Some("AAA")));
    assert!(engine.shutdown().unwrap().is_empty());
}

#[test]
/// The sweep drops a poisoned symbol and keeps going; the symbol starts
/// over cleanly on its next tick.
fn sweep_removes_poisoned_symbol_and_continues() {
    let engine = engine_with_poisoned_symbol();
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    engine.on_eviction(move |symbol| {
        sink.lock().unwrap().push(symbol.clone());
        Ok(())
    });

    let removed = engine.sweep_inactive(NOW).unwrap();
    assert_eq!(removed, vec!["AAA".to_string()]);
    assert_eq!(*evicted.lock().unwrap(), vec!["AAA".to_string()]);
    assert_eq!(engine.symbols(), vec!["ZZZ".to_string()]);

    let report = engine.ingest_at(live("AAA", NOW + 1, 1.0), NOW).unwrap();
    assert_eq!(report.accepted, 1);
}

#[test]
/// A tick landing in a bucket that was already flushed is rejected, so the
/// bucket is never emitted twice.
fn flushed_bucket_rejects_later_ticks() {
    let engine = engine_with_intervals(vec![60_000], 100);
    engine.ingest_at(live("R_10", 100_000, 1.0), NOW).unwrap();
    engine.ingest_at(live("R_10", 101_000, 2.0), NOW).unwrap();
    assert_eq!(engine.flush("R_10").unwrap().len(), 1);

    let report = engine.ingest_at(live("R_10", 105_000, 3.0), NOW).unwrap();
    assert_eq!(report.out_of_order, 1);
    engine.ingest_at(live("R_10", 125_000, 4.0), NOW).unwrap();
    engine.flush("R_10").unwrap();

    let opens: Vec<u64> = engine
        .get_candles("R_10", 60_000)
        .iter()
        .map(|c| c.open_time)
        .collect();
    assert_eq!(opens, vec![60_000, 120_000]);
}
