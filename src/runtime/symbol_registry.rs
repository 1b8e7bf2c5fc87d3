use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::ScannerEngine;
use crate::ingest::{normalize_symbol, FeedMessage};

/// Work item for a symbol worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolCommand {
    Feed(FeedMessage),
    /// Stop waiting for a backfill and release parked live ticks.
    OpenGate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    NoWorker,
    Full,
    Closed,
}

/// Routes commands to the single worker owning each symbol.
#[derive(Default)]
pub struct SymbolWorkerRegistry {
    workers: BTreeMap<String, SymbolWorkerHandle>,
}

struct SymbolWorkerHandle {
    worker_id: u64,
    command_tx: mpsc::Sender<SymbolCommand>,
}

impl SymbolWorkerRegistry {
    /// Register a worker, replacing any previous one for the symbol.
    pub fn register(
        &mut self,
        symbol: impl AsRef<str>,
        worker_id: u64,
        command_tx: mpsc::Sender<SymbolCommand>,
    ) {
        let symbol = normalize_symbol(symbol.as_ref());
        if let Some(previous) = self.workers.insert(
            symbol.clone(),
            SymbolWorkerHandle {
                worker_id,
                command_tx,
            },
        ) {
            tracing::debug!(symbol = %symbol, replaced = previous.worker_id, "Replaced symbol worker");
        }
    }

    /// Drop the worker's sender; the worker exits once its queue drains.
    pub fn unregister(&mut self, symbol: &str) -> bool {
        self.workers.remove(&normalize_symbol(symbol)).is_some()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.workers.contains_key(&normalize_symbol(symbol))
    }

    pub fn sender(&self, symbol: &str) -> Option<mpsc::Sender<SymbolCommand>> {
        self.workers
            .get(&normalize_symbol(symbol))
            .map(|w| w.command_tx.clone())
    }

    /// Non-blocking hand-off.
    pub fn dispatch(&self, symbol: &str, command: SymbolCommand) -> DispatchOutcome {
        let Some(worker) = self.workers.get(&normalize_symbol(symbol)) else {
            return DispatchOutcome::NoWorker;
        };
        match worker.command_tx.try_send(command) {
            Ok(()) => DispatchOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => DispatchOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => DispatchOutcome::Closed,
        }
    }

    /// Registered symbols in lexical order.
    pub fn symbols(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn clear(&mut self) {
        self.workers.clear();
    }
}

/// Spawn the task that owns `symbol`'s pipeline and feeds it commands in
/// arrival order. The task ends when every sender is dropped.
pub fn spawn_symbol_worker(
    engine: Arc<ScannerEngine>,
    symbol: String,
    capacity: usize,
) -> (mpsc::Sender<SymbolCommand>, JoinHandle<()>) {
    let (command_tx, mut command_rx) = mpsc::channel::<SymbolCommand>(capacity.max(1));
    let handle = tokio::spawn(async move {
        tracing::debug!(symbol = %symbol, "Symbol worker started");
        while let Some(command) = command_rx.recv().await {
            let result = match command {
                SymbolCommand::Feed(message) => engine.ingest(message).map(|_| ()),
                SymbolCommand::OpenGate => engine.open_gate(&symbol).map(|_| ()),
            };
            if let Err(e) = result {
                tracing::warn!(symbol = %symbol, error = %e, "Symbol worker command failed");
                engine.record_error(&e);
            }
        }
        tracing::debug!(symbol = %symbol, "Symbol worker stopped");
    });
    (command_tx, handle)
}
