use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::store::{Document, DocumentStore, Query};

/// Logical position a subscription fills in a view session. Re-subscribing
/// a slot replaces whatever was live there before.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Clients,
    Employees,
    Orders,
    ProjectPage { client_id: String },
}

/// What a live subscription pushes into the owning session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Full current result set for the slot's query.
    Snapshot { slot: SlotKey, docs: Vec<Document> },
    /// The slot's subscription failed; re-subscribing is safe.
    SubscriptionFailed { slot: SlotKey, message: String },
}

/// Tracks the live subscriptions of one view.
///
/// Guarantees at most one live subscription per slot: the previous pump
/// task is aborted *before* its replacement starts, so a snapshot for a
/// stale query can never race one for the current query. Dropping the
/// manager tears every subscription down.
pub struct SubscriptionManager {
    store: DocumentStore,
    events: mpsc::UnboundedSender<SessionEvent>,
    live: HashMap<SlotKey, JoinHandle<()>>,
}

impl SubscriptionManager {
    pub fn new(store: DocumentStore, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        SubscriptionManager {
            store,
            events,
            live: HashMap::new(),
        }
    }

    pub fn subscribe(&mut self, slot: SlotKey, query: Query) {
        if let Some(previous) = self.live.remove(&slot) {
            log::debug!("replacing live subscription for {slot:?}");
            previous.abort();
        }

        let store = self.store.clone();
        let events = self.events.clone();
        let key = slot.clone();
        let handle = tokio::spawn(async move {
            let mut subscription = store.subscribe(query);
            loop {
                match subscription.next().await {
                    Ok(Some(docs)) => {
                        let event = SessionEvent::Snapshot {
                            slot: key.clone(),
                            docs,
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("subscription for {key:?} failed: {e}");
                        let _ = events.send(SessionEvent::SubscriptionFailed {
                            slot: key.clone(),
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
        });
        self.live.insert(slot, handle);
    }

    pub fn unsubscribe(&mut self, slot: &SlotKey) {
        if let Some(handle) = self.live.remove(slot) {
            handle.abort();
        }
    }

    pub fn is_live(&self, slot: &SlotKey) -> bool {
        self.live.contains_key(slot)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn shutdown(&mut self) {
        for (slot, handle) in self.live.drain() {
            log::debug!("releasing live subscription for {slot:?}");
            handle.abort();
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
