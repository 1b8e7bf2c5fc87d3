//! Synchronous observer list used for candle, recommendation and status
//! notifications.
//!
//! Delivery order is registration order. Each subscriber is isolated: an
//! `Err` or a panic is logged and counted, and delivery continues with the
//! next subscriber. Callbacks run on the publishing thread with no engine
//! lock held, but must not subscribe or unsubscribe on the same bus from
//! inside a callback.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

type Callback<T> = Box<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct EventBus<T> {
    name: &'static str,
    subscribers: RwLock<Vec<(SubscriptionId, Callback<T>)>>,
    next_id: AtomicU64,
    failures: AtomicU64,
}

/// Result of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

impl<T> EventBus<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failures: AtomicU64::new(0),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match self.subscribers.write() {
            Ok(mut guard) => guard.push((id, Box::new(callback))),
            Err(poisoned) => poisoned.into_inner().push((id, Box::new(callback))),
        }
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = guard.len();
        guard.retain(|(sid, _)| *sid != id);
        guard.len() != before
    }

    pub fn publish(&self, event: &T) -> Delivery {
        let guard = match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut delivery = Delivery::default();
        for (id, callback) in guard.iter() {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(e)) => {
                    delivery.failed += 1;
                    tracing::warn!(bus = self.name, subscriber = id.0, error = %e, "Subscriber failed");
                }
                Err(_) => {
                    delivery.failed += 1;
                    tracing::warn!(bus = self.name, subscriber = id.0, "Subscriber panicked");
                }
            }
        }
        if delivery.failed > 0 {
            self.failures
                .fetch_add(delivery.failed as u64, Ordering::Relaxed);
        }
        delivery
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Total failed deliveries since creation.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
