//! Snapshot fan-out to connected clients.
//!
//! Level-triggered: only the latest encoded `state_update` matters. Each
//! subscriber holds a `watch` slot that every publish overwrites, so a slow
//! subscriber skips intermediate updates but always ends on the newest one.
//! New subscribers see the current state at once. Nothing is replayed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, error};

use marquee_core::snapshot::{ServerMessage, Snapshot};

#[derive(Default)]
struct Registry {
    latest: Option<String>,
    subscribers: HashMap<String, watch::Sender<Option<String>>>,
}

#[derive(Default)]
pub struct StateBroadcaster {
    registry: Mutex<Registry>,
    sub_id_seq: AtomicU64,
}

/// Receiving half of a subscription.
pub struct Subscription {
    id: String,
    rx: watch::Receiver<Option<String>>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for a message newer than the last one returned. `None` once the
    /// subscription is removed or the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            if let Some(message) = self.rx.borrow_and_update().clone() {
                return Some(message);
            }
        }
    }

    /// The latest message if it has not been seen yet.
    pub fn try_recv(&mut self) -> Option<String> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        self.rx.borrow_and_update().clone()
    }
}

impl StateBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `snapshot` as a `state_update`, remember it, and hand it to
    /// every subscriber without blocking. Returns the number of live
    /// subscribers.
    pub fn publish(&self, snapshot: Snapshot) -> usize {
        let encoded = match serde_json::to_string(&ServerMessage::state_update(snapshot)) {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(error = %err, "failed to encode state update");
                return 0;
            }
        };

        let mut registry = lock_registry(&self.registry);
        registry.subscribers.retain(|id, tx| {
            if tx.is_closed() {
                debug!(subscriber = %id, "pruning closed subscriber");
                return false;
            }
            tx.send_replace(Some(encoded.clone()));
            true
        });
        registry.latest = Some(encoded);
        registry.subscribers.len()
    }

    /// Register a subscriber. The current state, if any, is immediately
    /// available on the returned subscription.
    pub fn subscribe(&self) -> Subscription {
        let seq = self.sub_id_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("sub-{seq}");
        let (tx, rx) = watch::channel(None);

        let mut registry = lock_registry(&self.registry);
        if let Some(latest) = &registry.latest {
            tx.send_replace(Some(latest.clone()));
        }
        registry.subscribers.insert(id.clone(), tx);
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, sub_id: &str) {
        lock_registry(&self.registry).subscribers.remove(sub_id);
    }

    pub fn subscriber_count(&self) -> usize {
        lock_registry(&self.registry).subscribers.len()
    }

    /// The most recently published encoded message.
    pub fn latest(&self) -> Option<String> {
        lock_registry(&self.registry).latest.clone()
    }
}

fn lock_registry(lock: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
