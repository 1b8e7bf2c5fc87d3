use trend_scanner::candle::{CandleSeries, SymbolCandles};
use trend_scanner::error::ScannerError;
use trend_scanner::model::tick::TickEvent;

fn tick(ts_ms: u64, price: f64) -> TickEvent {
    TickEvent::new("R_100", price, ts_ms)
}

#[test]
/// Ticks at 100,101,109,110 s with a 10 s interval close exactly one
/// candle for [100,110) and leave 110 open in the next bucket.
fn ticks_are_bucketed_by_interval_start() {
    let mut series = CandleSeries::new(10_000, 10);
    let mut closed = Vec::new();
    for (ts, price) in [(100, 1.0), (101, 3.0), (109, 0.5), (110, 2.0)] {
        if let Some(c) = series.on_tick(&tick(ts * 1_000, price)).unwrap() {
            closed.push(c);
        }
    }

    assert_eq!(closed.len(), 1);
    let first = &closed[0];
    assert_eq!(first.open_time, 100_000);
    assert_eq!(first.close_time, 110_000);
    assert_eq!(first.tick_count, 3);
    assert!((first.open - 1.0).abs() < f64::EPSILON);
    assert!((first.high - 3.0).abs() < f64::EPSILON);
    assert!((first.low - 0.5).abs() < f64::EPSILON);
    assert!((first.close - 0.5).abs() < f64::EPSILON);

    let open = series.open_candle().unwrap();
    assert_eq!(open.open_time, 110_000);
    assert_eq!(open.tick_count, 1);

    let second = series.flush().unwrap();
    assert_eq!(second.open_time, 110_000);
    assert_eq!(second.tick_count, 1);
    assert_eq!(series.candles(), vec![first.clone(), second]);
}

#[test]
/// After more than MAX closes only the newest MAX remain, oldest first.
fn ring_buffer_keeps_most_recent_candles() {
    let max = 5;
    let mut series = CandleSeries::new(1_000, max);
    for i in 0..12u64 {
        series.on_tick(&tick(i * 1_000, 100.0 + i as f64)).unwrap();
    }
    // Eleven buckets have closed; the twelfth is still open.
    let candles = series.candles();
    assert_eq!(candles.len(), max);
    let opens: Vec<u64> = candles.iter().map(|c| c.open_time).collect();
    assert_eq!(opens, vec![6_000, 7_000, 8_000, 9_000, 10_000]);
}

#[test]
/// A tick that belongs to an earlier bucket is rejected and leaves the
/// open buffer untouched.
fn late_tick_does_not_mutate_open_buffer() {
    let mut series = CandleSeries::new(10_000, 10);
    series.on_tick(&tick(20_000, 5.0)).unwrap();
    series.on_tick(&tick(25_000, 6.0)).unwrap();
    let before = series.open_candle().cloned();

    let err = series.on_tick(&tick(19_999, 100.0)).unwrap_err();
    assert!(matches!(
        err,
        ScannerError::LateTick {
            bucket_start: 10_000,
            open_start: 20_000,
            ..
        }
    ));
    assert_eq!(series.open_candle().cloned(), before);
    assert!(series.is_empty());
}

#[test]
fn flush_twice_emits_once() {
    let mut series = CandleSeries::new(60_000, 10);
    series.on_tick(&tick(1_000, 1.0)).unwrap();
    assert!(series.flush().is_some());
    assert!(series.flush().is_none());
    assert_eq!(series.len(), 1);
}

#[test]
/// The same tick log always produces the same candles.
fn replay_is_deterministic() {
    let ticks: Vec<TickEvent> = (0..500u64)
        .map(|i| tick(i * 700, 100.0 + ((i * 37) % 11) as f64 * 0.1))
        .collect();

    let run = || {
        let mut candles = SymbolCandles::new(&[5_000, 60_000], 1_000);
        let mut out = Vec::new();
        for t in &ticks {
            out.extend(candles.on_tick(t).unwrap());
        }
        out.extend(candles.flush());
        out
    };

    let first = run();
    let second = run();
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(format!("{:?}", first), format!("{:?}", second));
}

#[test]
/// A late tick for any interval is rejected before any series moves.
fn multi_interval_rejection_is_atomic() {
    let mut candles = SymbolCandles::new(&[1_000, 10_000], 10);
    candles.on_tick(&tick(12_500, 1.0)).unwrap();
    let short_before = candles.series(1_000).unwrap().open_candle().cloned();
    let long_before = candles.series(10_000).unwrap().open_candle().cloned();

    // Same 10 s bucket, but an earlier 1 s bucket.
    assert!(candles.on_tick(&tick(11_000, 2.0)).is_err());
    assert_eq!(candles.series(1_000).unwrap().open_candle().cloned(), short_before);
    assert_eq!(candles.series(10_000).unwrap().open_candle().cloned(), long_before);
    assert!(candles.candles(1_000).is_empty());
}

#[test]
/// Once a bucket has been flushed it stays closed: later ticks inside it
/// are late, so every bucket yields at most one candle.
fn flushed_bucket_is_never_reopened() {
    let mut series = CandleSeries::new(60_000, 10);
    series.on_tick(&tick(100_000, 1.0)).unwrap();
    series.on_tick(&tick(101_000, 2.0)).unwrap();
    let flushed = series.flush().unwrap();
    assert_eq!(flushed.open_time, 60_000);
    assert_eq!(flushed.tick_count, 2);

    let err = series.on_tick(&tick(105_000, 3.0)).unwrap_err();
    assert!(matches!(
        err,
        ScannerError::LateTick {
            bucket_start: 60_000,
            open_start: 60_000,
            ..
        }
    ));
    assert!(series.open_candle().is_none());

    series.on_tick(&tick(120_000, 4.0)).unwrap();
    series.flush();
    let opens: Vec<u64> = series.candles().iter().map(|c| c.open_time).collect();
    assert_eq!(opens, vec![60_000, 120_000]);
}

#[test]
/// A timestamp whose bucket end overflows is malformed, not a panic.
fn unbucketable_timestamp_is_malformed() {
    let mut candles = SymbolCandles::new(&[1_000, 60_000], 10);
    candles.on_tick(&tick(5_000, 1.0)).unwrap();
    let err = candles.on_tick(&tick(u64::MAX, 2.0)).unwrap_err();
    assert!(matches!(err, ScannerError::MalformedTick { .. }));
    assert_eq!(candles.series(1_000).unwrap().open_candle().unwrap().open_time, 5_000);
}
