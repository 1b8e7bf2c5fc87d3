pub mod scheduler;
pub mod symbol_registry;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::engine::ScannerEngine;
use crate::error::ScannerError;
use crate::event::{FeedEvent, FeedStatus};
use crate::ingest::{normalize_symbol, FeedMessage};
use symbol_registry::{spawn_symbol_worker, DispatchOutcome, SymbolCommand, SymbolWorkerRegistry};

/// Why `run_event_loop` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    FeedFinished,
    FeedClosed,
}

struct Router {
    engine: Arc<ScannerEngine>,
    registry: SymbolWorkerRegistry,
    workers: JoinSet<()>,
    capacity: usize,
    next_worker_id: u64,
}

impl Router {
    fn sender_for(&mut self, symbol: &str) -> mpsc::Sender<SymbolCommand> {
        if let Some(tx) = self.registry.sender(symbol) {
            return tx;
        }
        self.next_worker_id += 1;
        let (tx, handle) =
            spawn_symbol_worker(Arc::clone(&self.engine), symbol.to_string(), self.capacity);
        self.workers.spawn(async move {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Symbol worker panicked");
            }
        });
        self.registry.register(symbol, self.next_worker_id, tx.clone());
        tx
    }

    /// Live ticks are handed off without waiting, so one slow symbol never
    /// holds up the others; a full queue drops the tick for that symbol
    /// only. Backfill, forget and gate commands carry ordering state and
    /// wait for queue space instead.
    async fn route(&mut self, symbol: &str, command: SymbolCommand) {
        let forget = matches!(command, SymbolCommand::Feed(FeedMessage::Forget { .. }));
        let tx = self.sender_for(symbol);
        if matches!(command, SymbolCommand::Feed(FeedMessage::Live(_))) {
            match self.registry.dispatch(symbol, command) {
                DispatchOutcome::Delivered => {}
                DispatchOutcome::Full => self
                    .engine
                    .record_error(&ScannerError::QueueFull(symbol.to_string())),
                DispatchOutcome::Closed | DispatchOutcome::NoWorker => {
                    tracing::warn!(symbol, "Symbol worker gone, dropping command");
                    self.registry.unregister(symbol);
                }
            }
            return;
        }
        if tx.send(command).await.is_err() {
            tracing::warn!(symbol, "Symbol worker gone, dropping command");
            self.registry.unregister(symbol);
            return;
        }
        if forget {
            self.registry.unregister(symbol);
        }
    }

    /// The engine swept `symbol`; let its worker drain and exit.
    fn evict(&mut self, symbol: &str) {
        if self.registry.unregister(symbol) {
            tracing::debug!(symbol, "Released worker of evicted symbol");
        }
    }

    async fn handle(&mut self, event: FeedEvent) -> Option<LoopExit> {
        match event {
            FeedEvent::Message(message) => {
                let symbol = normalize_symbol(message.symbol());
                if symbol.is_empty() {
                    // Let the engine count it as malformed.
                    if let Err(e) = self.engine.ingest(message) {
                        self.engine.record_error(&e);
                    }
                    return None;
                }
                self.route(&symbol, SymbolCommand::Feed(message)).await;
            }
            FeedEvent::BackfillUnavailable { symbol } => {
                let symbol = normalize_symbol(&symbol);
                tracing::warn!(symbol = %symbol, "Backfill unavailable, releasing live ticks");
                self.route(&symbol, SymbolCommand::OpenGate).await;
            }
            FeedEvent::Status { symbol, status } => match status {
                FeedStatus::Connected => tracing::info!(symbol = %symbol, "Feed connected"),
                FeedStatus::Disconnected => tracing::warn!(symbol = %symbol, "Feed disconnected"),
                FeedStatus::Reconnecting { attempt, delay_ms } => {
                    tracing::info!(symbol = %symbol, attempt, delay_ms, "Feed reconnecting")
                }
                FeedStatus::Exhausted { attempts } => {
                    tracing::error!(symbol = %symbol, attempts, "Feed retries exhausted")
                }
            },
            FeedEvent::Error(e) => self.engine.record_error(&e),
            FeedEvent::Finished => return Some(LoopExit::FeedFinished),
        }
        None
    }

    /// Close every worker queue and wait for the queues to drain.
    async fn drain(mut self) {
        self.registry.clear();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker supervisor failed");
            }
        }
    }
}

/// Route feed events to per-symbol workers until shutdown or until the feed
/// ends. Every queued message is processed before this returns.
pub async fn run_event_loop(
    engine: Arc<ScannerEngine>,
    mut events: mpsc::Receiver<FeedEvent>,
    mut shutdown: watch::Receiver<bool>,
    worker_capacity: usize,
) -> LoopExit {
    let (evicted_tx, mut evicted_rx) = mpsc::unbounded_channel::<String>();
    let eviction_sub = engine.on_eviction(move |symbol| {
        let _ = evicted_tx.send(symbol.clone());
        Ok(())
    });

    let mut router = Router {
        engine,
        registry: SymbolWorkerRegistry::default(),
        workers: JoinSet::new(),
        capacity: worker_capacity,
        next_worker_id: 0,
    };

    let exit = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break LoopExit::FeedClosed;
                };
                if let Some(exit) = router.handle(event).await {
                    break exit;
                }
            }
            Some(symbol) = evicted_rx.recv() => router.evict(&symbol),
            _ = shutdown.changed() => break LoopExit::Shutdown,
        }
    };

    router.engine.eviction_events().unsubscribe(eviction_sub);
    let symbols = router.registry.len();
    router.drain().await;
    tracing::info!(?exit, symbols, "Event loop stopped");
    exit
}
