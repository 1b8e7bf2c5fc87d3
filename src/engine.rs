//! `ScannerEngine`: owns every per-symbol pipeline and the ranked output.
//!
//! Each symbol has a single pipeline (gate, candles, indicators, trend
//! scorer) behind its own mutex, so symbols never contend with each other.
//! The latest analysis of a symbol lives next to the pipeline as an
//! immutable `Arc` that is swapped whole after every update; the scan timer
//! only ever reads those snapshots. Subscriber callbacks always run after
//! the pipeline lock has been released.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use crate::bus::{EventBus, SubscriptionId};
use crate::candle::SymbolCandles;
use crate::config::EngineConfig;
use crate::error::{ErrorKind, ScannerError, ScannerResult};
use crate::ingest::{
    normalize_backfill, normalize_live, normalize_symbol, BackfillGate, FeedMessage, GateDecision,
};
use crate::model::analysis::MultiTimeframeAnalysis;
use crate::model::candle::Candle;
use crate::model::recommendation::{EngineStatus, ErrorRecord, Recommendation};
use crate::model::tick::TickEvent;
use crate::ranker::Ranker;
use crate::scorer::{IndicatorVoteScorer, MomentumScorer};
use crate::stats::SymbolStats;
use crate::trend::TrendScorer;

/// Entries kept in the status error log.
pub const MAX_ERROR_LOG: usize = 64;

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Outcome of one `ingest` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub buffered: usize,
    pub evicted: usize,
    pub malformed: usize,
    pub out_of_order: usize,
    /// Backfill entries dropped as already covered by live data.
    pub overlapping: usize,
    pub candles_closed: usize,
}

struct SymbolPipeline {
    symbol: String,
    gate: BackfillGate,
    last_ts: Option<u64>,
    last_price: f64,
    candles: SymbolCandles,
    stats: SymbolStats,
    trend: TrendScorer,
    last_activity_ms: u64,
}

impl SymbolPipeline {
    fn new(symbol: String, expect_backfill: bool, config: &EngineConfig, now_ms: u64) -> Self {
        Self {
            symbol,
            gate: BackfillGate::new(expect_backfill, config.scanner.max_pending_live_ticks),
            last_ts: None,
            last_price: 0.0,
            candles: SymbolCandles::new(&config.candle_intervals_ms, config.max_candles),
            stats: SymbolStats::new(&config.candle_intervals_ms, &config.indicators),
            trend: TrendScorer::new(&config.timeframes),
            last_activity_ms: now_ms,
        }
    }

    /// Fold one tick into every stage. Nothing is mutated on rejection.
    fn apply(&mut self, tick: &TickEvent) -> ScannerResult<Vec<Candle>> {
        if let Some(last) = self.last_ts {
            if tick.timestamp_ms < last {
                return Err(ScannerError::OutOfOrderTick {
                    symbol: tick.symbol.clone(),
                    timestamp_ms: tick.timestamp_ms,
                    last_ms: last,
                });
            }
        }
        let closed = self.candles.on_tick(tick)?;
        self.stats.on_tick(tick);
        for candle in &closed {
            self.stats.on_candle(candle);
        }
        self.trend.push(tick.price);
        self.last_ts = Some(tick.timestamp_ms);
        self.last_price = tick.price;
        Ok(closed)
    }

    fn flush(&mut self) -> Vec<Candle> {
        let flushed = self.candles.flush();
        for candle in &flushed {
            self.stats.on_candle(candle);
        }
        flushed
    }

    /// Close open candles and drop indicator and trend state. The last
    /// accepted timestamp is kept so ordering still holds afterwards.
    fn reset(&mut self) -> Vec<Candle> {
        let flushed = self.flush();
        self.stats.reset();
        self.trend.reset();
        flushed
    }

    fn analyze(&self, scorer: &dyn MomentumScorer, now_ms: u64) -> Option<MultiTimeframeAnalysis> {
        let timestamp_ms = self.last_ts?;
        let summary = self.trend.summarize();
        let indicators = self.stats.snapshots();
        let scorer = scorer.score(&self.stats.tick_state().snapshot());
        Some(MultiTimeframeAnalysis {
            symbol: self.symbol.clone(),
            timestamp_ms,
            computed_at_ms: now_ms,
            last_price: self.last_price,
            timeframes: summary.timeframes,
            consensus: summary.consensus,
            alignment: summary.alignment,
            weighted_score: summary.weighted_score,
            cascade_strength: summary.cascade_strength,
            indicators,
            scorer,
        })
    }
}

struct SymbolSlot {
    pipeline: Mutex<SymbolPipeline>,
    analysis: RwLock<Option<Arc<MultiTimeframeAnalysis>>>,
}

pub struct ScannerEngine {
    config: EngineConfig,
    symbols: RwLock<HashMap<String, Arc<SymbolSlot>>>,
    scorer: Arc<dyn MomentumScorer>,
    ranker: Mutex<Ranker>,
    errors: Mutex<VecDeque<ErrorRecord>>,
    malformed_count: AtomicU64,
    out_of_order_count: AtomicU64,
    dropped_count: AtomicU64,
    error_count: AtomicU64,
    candle_bus: EventBus<Candle>,
    eviction_bus: EventBus<String>,
    recommendation_bus: EventBus<Vec<Recommendation>>,
    status_bus: EventBus<EngineStatus>,
    status_tx: watch::Sender<EngineStatus>,
    recommendations_tx: watch::Sender<Arc<Vec<Recommendation>>>,
    shut_down: AtomicBool,
}

fn lock<'a, T>(m: &'a Mutex<T>, name: &'static str) -> ScannerResult<MutexGuard<'a, T>> {
    m.lock().map_err(|_| ScannerError::LockPoisoned(name))
}

fn lock_pipeline<'a>(
    slot: &'a SymbolSlot,
    symbol: &str,
) -> ScannerResult<MutexGuard<'a, SymbolPipeline>> {
    slot.pipeline
        .lock()
        .map_err(|_| ScannerError::PipelinePoisoned(symbol.to_string()))
}

fn write<'a, T>(l: &'a RwLock<T>, name: &'static str) -> ScannerResult<RwLockWriteGuard<'a, T>> {
    l.write().map_err(|_| ScannerError::LockPoisoned(name))
}

// Read paths keep serving the last consistent value after a panic elsewhere.
fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match l.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn lock_or_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ScannerEngine {
    pub fn new(config: EngineConfig) -> ScannerResult<Self> {
        Self::with_scorer(config, Arc::new(IndicatorVoteScorer::default()))
    }

    pub fn with_scorer(config: EngineConfig, scorer: Arc<dyn MomentumScorer>) -> ScannerResult<Self> {
        config
            .validate()
            .map_err(|e| ScannerError::Config(format!("{:#}", e)))?;
        let (status_tx, _) = watch::channel(EngineStatus::default());
        let (recommendations_tx, _) = watch::channel(Arc::new(Vec::new()));
        Ok(Self {
            ranker: Mutex::new(Ranker::new(config.ranker.clone())),
            config,
            symbols: RwLock::new(HashMap::new()),
            scorer,
            errors: Mutex::new(VecDeque::with_capacity(MAX_ERROR_LOG)),
            malformed_count: AtomicU64::new(0),
            out_of_order_count: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            candle_bus: EventBus::new("candles"),
            eviction_bus: EventBus::new("evictions"),
            recommendation_bus: EventBus::new("recommendations"),
            status_bus: EventBus::new("status"),
            status_tx,
            recommendations_tx,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn slot(&self, symbol: &str) -> Option<Arc<SymbolSlot>> {
        read(&self.symbols).get(symbol).cloned()
    }

    fn slot_or_create(
        &self,
        symbol: &str,
        expect_backfill: bool,
        now_ms: u64,
    ) -> ScannerResult<(Arc<SymbolSlot>, bool)> {
        if let Some(slot) = self.slot(symbol) {
            return Ok((slot, false));
        }
        let mut symbols = write(&self.symbols, "symbol map")?;
        if let Some(slot) = symbols.get(symbol) {
            return Ok((Arc::clone(slot), false));
        }
        let slot = Arc::new(SymbolSlot {
            pipeline: Mutex::new(SymbolPipeline::new(
                symbol.to_string(),
                expect_backfill,
                &self.config,
                now_ms,
            )),
            analysis: RwLock::new(None),
        });
        symbols.insert(symbol.to_string(), Arc::clone(&slot));
        Ok((slot, true))
    }

    /// Register a symbol. With `expect_backfill`, live ticks are parked until
    /// the backfill batch arrives. Returns false if it already existed.
    pub fn subscribe(&self, symbol: &str, expect_backfill: bool) -> ScannerResult<bool> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(ScannerError::UnknownSymbol(symbol));
        }
        let (_, created) = self.slot_or_create(&symbol, expect_backfill, now_ms())?;
        if created {
            tracing::info!(symbol = %symbol, expect_backfill, "Symbol subscribed");
            self.publish_status();
        }
        Ok(created)
    }

    /// Drop a symbol after flushing its open candles. Returns false if the
    /// symbol was not registered.
    pub fn unsubscribe(&self, symbol: &str) -> ScannerResult<bool> {
        let symbol = normalize_symbol(symbol);
        let removed = write(&self.symbols, "symbol map")?.remove(&symbol);
        let Some(slot) = removed else {
            return Ok(false);
        };
        // A poisoned pipeline has nothing trustworthy left to flush.
        let flushed = match lock_pipeline(&slot, &symbol) {
            Ok(mut pipeline) => pipeline.flush(),
            Err(e) => {
                self.record_error(&e);
                Vec::new()
            }
        };
        for candle in &flushed {
            self.candle_bus.publish(candle);
        }
        tracing::info!(symbol = %symbol, flushed = flushed.len(), "Symbol unsubscribed");
        self.publish_status();
        Ok(true)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = read(&self.symbols).keys().cloned().collect();
        out.sort();
        out
    }

    pub fn ingest(&self, message: FeedMessage) -> ScannerResult<IngestReport> {
        self.ingest_at(message, now_ms())
    }

    /// Ingest with an explicit local clock, for replay and tests.
    pub fn ingest_at(&self, message: FeedMessage, now_ms: u64) -> ScannerResult<IngestReport> {
        if self.shut_down.load(Ordering::Acquire) {
            tracing::debug!(symbol = message.symbol(), "Engine shut down, dropping message");
            return Ok(IngestReport::default());
        }
        match message {
            FeedMessage::Live(quote) => match normalize_live(&quote) {
                Ok(tick) => self.ingest_live(tick, now_ms),
                Err(e) => {
                    self.record_error(&e);
                    Ok(IngestReport {
                        malformed: 1,
                        ..IngestReport::default()
                    })
                }
            },
            FeedMessage::Backfill(batch) => {
                let symbol = normalize_symbol(&batch.symbol);
                if symbol.is_empty() {
                    let e = ScannerError::MalformedTick {
                        symbol,
                        reason: "backfill without symbol".to_string(),
                    };
                    self.record_error(&e);
                    return Ok(IngestReport {
                        malformed: batch.timestamps.len().max(batch.prices.len()),
                        ..IngestReport::default()
                    });
                }
                let (ticks, malformed) = normalize_backfill(&batch);
                let mut report = self.ingest_backfill(&symbol, ticks, now_ms)?;
                if malformed > 0 {
                    let e = ScannerError::MalformedTick {
                        symbol,
                        reason: format!("{} backfill entries dropped", malformed),
                    };
                    self.record_errors(&e, malformed as u64);
                    report.malformed += malformed;
                }
                Ok(report)
            }
            FeedMessage::Forget { symbol } => {
                self.unsubscribe(&symbol)?;
                Ok(IngestReport::default())
            }
        }
    }

    fn ingest_live(&self, tick: TickEvent, now_ms: u64) -> ScannerResult<IngestReport> {
        let (slot, created) = self.slot_or_create(&tick.symbol, false, now_ms)?;
        if created {
            tracing::info!(symbol = %tick.symbol, "Auto-subscribed symbol on first tick");
        }
        let mut report = IngestReport::default();
        let (closed, errors) = {
            let mut pipeline = lock_pipeline(&slot, &tick.symbol)?;
            pipeline.last_activity_ms = now_ms;
            match pipeline.gate.on_live(tick) {
                GateDecision::Forward(tick) => {
                    self.process(&slot, &mut pipeline, vec![tick], now_ms, &mut report)?
                }
                GateDecision::Buffered => {
                    report.buffered = 1;
                    (Vec::new(), Vec::new())
                }
                GateDecision::BufferedEvicted => {
                    report.buffered = 1;
                    report.evicted = 1;
                    tracing::warn!(symbol = %pipeline.symbol, "Pending live buffer full, evicted oldest tick");
                    (Vec::new(), Vec::new())
                }
            }
        };
        self.finish_ingest(closed, errors, created);
        Ok(report)
    }

    fn ingest_backfill(
        &self,
        symbol: &str,
        ticks: Vec<TickEvent>,
        now_ms: u64,
    ) -> ScannerResult<IngestReport> {
        let (slot, created) = self.slot_or_create(symbol, false, now_ms)?;
        let mut report = IngestReport::default();
        let (closed, errors) = {
            let mut pipeline = lock_pipeline(&slot, symbol)?;
            pipeline.last_activity_ms = now_ms;
            let last_ts = pipeline.last_ts;
            let release = pipeline.gate.apply_backfill(ticks, last_ts);
            report.overlapping = release.overlapping;
            if release.overlapping > 0 {
                tracing::debug!(symbol, overlapping = release.overlapping, "Discarded overlapping backfill");
            }
            self.process(&slot, &mut pipeline, release.ticks, now_ms, &mut report)?
        };
        tracing::info!(symbol, accepted = report.accepted, "Backfill applied");
        self.finish_ingest(closed, errors, created);
        Ok(report)
    }

    /// Release parked live ticks without a backfill.
    pub fn open_gate(&self, symbol: &str) -> ScannerResult<IngestReport> {
        let symbol = normalize_symbol(symbol);
        let slot = self
            .slot(&symbol)
            .ok_or_else(|| ScannerError::UnknownSymbol(symbol.clone()))?;
        let now = now_ms();
        let mut report = IngestReport::default();
        let (closed, errors) = {
            let mut pipeline = lock_pipeline(&slot, &symbol)?;
            let released = pipeline.gate.open();
            self.process(&slot, &mut pipeline, released, now, &mut report)?
        };
        self.finish_ingest(closed, errors, false);
        Ok(report)
    }

    /// Run ticks through the pipeline and refresh the analysis snapshot.
    /// Called with the pipeline lock held; nothing is published here.
    fn process(
        &self,
        slot: &SymbolSlot,
        pipeline: &mut SymbolPipeline,
        ticks: Vec<TickEvent>,
        now_ms: u64,
        report: &mut IngestReport,
    ) -> ScannerResult<(Vec<Candle>, Vec<ScannerError>)> {
        let mut closed = Vec::new();
        let mut errors = Vec::new();
        for tick in &ticks {
            match pipeline.apply(tick) {
                Ok(mut candles) => {
                    report.accepted += 1;
                    closed.append(&mut candles);
                }
                Err(e) => {
                    match e.kind() {
                        ErrorKind::Malformed => report.malformed += 1,
                        _ => report.out_of_order += 1,
                    }
                    errors.push(e);
                }
            }
        }
        report.candles_closed += closed.len();
        if report.accepted > 0 {
            if let Some(analysis) = pipeline.analyze(self.scorer.as_ref(), now_ms) {
                *write(&slot.analysis, "analysis snapshot")? = Some(Arc::new(analysis));
            }
        }
        Ok((closed, errors))
    }

    fn finish_ingest(&self, closed: Vec<Candle>, errors: Vec<ScannerError>, created: bool) {
        for e in &errors {
            self.record_error(e);
        }
        for candle in &closed {
            tracing::debug!(symbol = %candle.symbol, open_time = candle.open_time, "Candle closed");
            self.candle_bus.publish(candle);
        }
        if created {
            self.publish_status();
        }
    }

    pub fn get_analysis(&self, symbol: &str) -> Option<Arc<MultiTimeframeAnalysis>> {
        let slot = self.slot(&normalize_symbol(symbol))?;
        let analysis = read(&slot.analysis).clone();
        analysis
    }

    /// Completed candles for one interval, oldest first.
    pub fn get_candles(&self, symbol: &str, interval_ms: u64) -> Vec<Candle> {
        let Some(slot) = self.slot(&normalize_symbol(symbol)) else {
            return Vec::new();
        };
        let candles = lock_or_recover(&slot.pipeline).candles.candles(interval_ms);
        candles
    }

    /// Top `count` entries of the last published list.
    pub fn get_recommendations(&self, count: usize) -> Vec<Recommendation> {
        lock_or_recover(&self.ranker).top(count)
    }

    /// Rebuild the ranked list from the current analysis snapshots.
    pub fn run_scan(&self, now_ms: u64) -> ScannerResult<Arc<Vec<Recommendation>>> {
        let slots: Vec<Arc<SymbolSlot>> = read(&self.symbols).values().cloned().collect();
        let analyses: Vec<Arc<MultiTimeframeAnalysis>> = slots
            .iter()
            .filter_map(|slot| read(&slot.analysis).clone())
            .collect();
        let list = lock(&self.ranker, "ranker")?.rank(analyses.iter().map(|a| a.as_ref()), now_ms);
        tracing::debug!(
            analyzed = analyses.len(),
            recommended = list.len(),
            "Scan complete"
        );

        self.recommendation_bus.publish(list.as_ref());
        self.recommendations_tx.send_replace(Arc::clone(&list));
        self.publish_status();
        Ok(list)
    }

    /// Unsubscribe every symbol idle for longer than `stale_after_ms`, plus
    /// any symbol whose pipeline was poisoned. Each removed symbol is
    /// announced on the eviction bus.
    pub fn sweep_inactive(&self, now_ms: u64) -> ScannerResult<Vec<String>> {
        let stale_after = self.config.scanner.stale_after_ms;
        let slots: Vec<(String, Arc<SymbolSlot>)> = read(&self.symbols)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        let mut stale = Vec::new();
        for (symbol, slot) in slots {
            match lock_pipeline(&slot, &symbol) {
                Ok(pipeline) => {
                    if now_ms.saturating_sub(pipeline.last_activity_ms) > stale_after {
                        stale.push(symbol);
                    }
                }
                Err(e) => {
                    self.record_error(&e);
                    stale.push(symbol);
                }
            }
        }
        stale.sort();
        for symbol in &stale {
            tracing::info!(symbol = %symbol, "Removing inactive symbol");
            if let Err(e) = self.unsubscribe(symbol) {
                self.record_error(&e);
                continue;
            }
            self.eviction_bus.publish(symbol);
        }
        Ok(stale)
    }

    /// Force-close the open candles of one symbol. A second call returns an
    /// empty list and notifies nobody.
    pub fn flush(&self, symbol: &str) -> ScannerResult<Vec<Candle>> {
        let symbol = normalize_symbol(symbol);
        let slot = self
            .slot(&symbol)
            .ok_or_else(|| ScannerError::UnknownSymbol(symbol.clone()))?;
        let flushed = lock_pipeline(&slot, &symbol)?.flush();
        for candle in &flushed {
            self.candle_bus.publish(candle);
        }
        Ok(flushed)
    }

    /// Flush a symbol's candles and restart its indicators from scratch.
    /// The analysis snapshot is withdrawn until the next accepted tick.
    pub fn reset(&self, symbol: &str) -> ScannerResult<Vec<Candle>> {
        let symbol = normalize_symbol(symbol);
        let slot = self
            .slot(&symbol)
            .ok_or_else(|| ScannerError::UnknownSymbol(symbol.clone()))?;
        let flushed = {
            let mut pipeline = lock_pipeline(&slot, &symbol)?;
            let flushed = pipeline.reset();
            *write(&slot.analysis, "analysis snapshot")? = None;
            flushed
        };
        for candle in &flushed {
            self.candle_bus.publish(candle);
        }
        tracing::info!(symbol = %symbol, flushed = flushed.len(), "Symbol state reset");
        Ok(flushed)
    }

    /// Flush every symbol and stop accepting input. Idempotent. A symbol
    /// that cannot be flushed is logged and dropped; the rest still flush.
    pub fn shutdown(&self) -> ScannerResult<Vec<Candle>> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(Vec::new());
        }
        let mut flushed = Vec::new();
        for symbol in self.symbols() {
            match self.flush(&symbol) {
                Ok(mut candles) => flushed.append(&mut candles),
                Err(ScannerError::UnknownSymbol(_)) => {}
                Err(e) => {
                    self.record_error(&e);
                    write(&self.symbols, "symbol map")?.remove(&symbol);
                }
            }
        }
        tracing::info!(flushed = flushed.len(), "Engine shut down");
        self.publish_status();
        Ok(flushed)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn record_error(&self, error: &ScannerError) {
        self.record_errors(error, 1);
    }

    fn record_errors(&self, error: &ScannerError, count: u64) {
        let kind = error.kind();
        match kind {
            ErrorKind::Malformed => {
                self.malformed_count.fetch_add(count, Ordering::Relaxed);
                tracing::warn!(kind = kind.as_str(), count, error = %error, "Dropped malformed input");
            }
            ErrorKind::OutOfOrder => {
                self.out_of_order_count.fetch_add(count, Ordering::Relaxed);
                tracing::warn!(kind = kind.as_str(), error = %error, "Rejected out-of-order tick");
            }
            ErrorKind::Subscription => {
                tracing::error!(kind = kind.as_str(), error = %error, "Feed subscription failed");
            }
            ErrorKind::Dropped => {
                self.dropped_count.fetch_add(count, Ordering::Relaxed);
                tracing::warn!(kind = kind.as_str(), error = %error, "Dropped live tick");
            }
            ErrorKind::Other => {
                tracing::warn!(kind = kind.as_str(), error = %error, "Engine error");
            }
        }
        self.error_count.fetch_add(count, Ordering::Relaxed);

        let mut log = lock_or_recover(&self.errors);
        if log.len() >= MAX_ERROR_LOG {
            let _ = log.pop_front();
        }
        log.push_back(ErrorRecord {
            timestamp_ms: now_ms(),
            symbol: error.symbol().map(str::to_string),
            kind: kind.as_str(),
            message: error.to_string(),
        });
    }

    pub fn status(&self) -> EngineStatus {
        let (last_scan_ms, latest) = {
            let ranker = lock_or_recover(&self.ranker);
            (ranker.last_scan_ms(), ranker.latest())
        };
        let average_confidence = if latest.is_empty() {
            0.0
        } else {
            latest.iter().map(|r| r.confidence).sum::<f64>() / latest.len() as f64
        };
        EngineStatus {
            connected_symbols: read(&self.symbols).len(),
            last_scan_ms,
            average_confidence,
            recommendation_count: latest.len(),
            malformed_count: self.malformed_count.load(Ordering::Relaxed),
            out_of_order_count: self.out_of_order_count.load(Ordering::Relaxed),
            dropped_count: self.dropped_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            recent_errors: lock_or_recover(&self.errors).iter().cloned().collect(),
        }
    }

    fn publish_status(&self) {
        let status = self.status();
        self.status_bus.publish(&status);
        self.status_tx.send_replace(status);
    }

    pub fn on_candle<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Candle) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.candle_bus.subscribe(callback)
    }

    pub fn on_recommendations<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Vec<Recommendation>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.recommendation_bus.subscribe(callback)
    }

    pub fn on_status<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&EngineStatus) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.status_bus.subscribe(callback)
    }

    /// Called with the symbol name whenever the sweep removes a symbol.
    pub fn on_eviction<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&String) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.eviction_bus.subscribe(callback)
    }

    pub fn eviction_events(&self) -> &EventBus<String> {
        &self.eviction_bus
    }

    pub fn candle_events(&self) -> &EventBus<Candle> {
        &self.candle_bus
    }

    pub fn recommendation_events(&self) -> &EventBus<Vec<Recommendation>> {
        &self.recommendation_bus
    }

    pub fn status_events(&self) -> &EventBus<EngineStatus> {
        &self.status_bus
    }

    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status_tx.subscribe()
    }

    pub fn watch_recommendations(&self) -> watch::Receiver<Arc<Vec<Recommendation>>> {
        self.recommendations_tx.subscribe()
    }
}
