use tokio::sync::broadcast;

use crate::core::store::DocumentStore;
use crate::core::store::document::{ChangeEvent, Document};
use crate::core::store::query::Query;
use crate::error::Result;

/// A live query over the store.
///
/// `next()` resolves to the *full* current result set: the initial snapshot
/// first, then a fresh snapshot after every committed write that touches the
/// query's collection. Snapshots identical to the previous delivery are
/// suppressed, so consumers only wake when the visible result actually
/// changed. Returns `Ok(None)` once closed or when the store goes away.
pub struct Subscription {
    store: DocumentStore,
    query: Query,
    changes: broadcast::Receiver<ChangeEvent>,
    last: Option<Vec<Document>>,
    emitted_initial: bool,
    closed: bool,
}

impl Subscription {
    pub(super) fn new(
        store: DocumentStore,
        query: Query,
        changes: broadcast::Receiver<ChangeEvent>,
    ) -> Self {
        Subscription {
            store,
            query,
            changes,
            last: None,
            emitted_initial: false,
            closed: false,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub async fn next(&mut self) -> Result<Option<Vec<Document>>> {
        if self.closed {
            return Ok(None);
        }

        if !self.emitted_initial {
            self.emitted_initial = true;
            let docs = self.store.query(&self.query).await?;
            self.last = Some(docs.clone());
            return Ok(Some(docs));
        }

        loop {
            match self.changes.recv().await {
                Ok(event) => {
                    if !self.query.matches_event_collection(&event.collection) {
                        continue;
                    }
                }
                // Missed events are harmless: the next snapshot is computed
                // from scratch either way.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("subscription lagged by {skipped} events, re-running query");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.closed = true;
                    return Ok(None);
                }
            }

            let docs = self.store.query(&self.query).await?;
            if self.last.as_ref().is_some_and(|previous| *previous == docs) {
                continue;
            }
            self.last = Some(docs.clone());
            return Ok(Some(docs));
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
