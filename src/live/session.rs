use tokio::sync::broadcast::error::TryRecvError as BroadcastTryRecvError;
use tokio::sync::{broadcast, mpsc, watch};

use crate::core::model::{Client, Employee, Order, Project};
use crate::core::store::{ChangeEvent, DocumentStore, TenantQuery};
use crate::error::Result;
use crate::join::{JoinResolver, ResidentCache};
use crate::live::manager::{SessionEvent, SlotKey, SubscriptionManager};
use crate::paging::{DEFAULT_PAGE_SIZE, ProjectPage, ProjectPager};
use crate::rollup::{AggregateInput, ViewFilters, ViewKind, ViewRow, aggregate};

/// The single logical consumer of the live layer.
///
/// Owns the subscriptions, the resident snapshots they deliver, the
/// pagination state for the projects collection, and the derived rows it
/// publishes on a watch channel. All mutation goes through `&mut self`, so
/// aggregation state never needs locking.
///
/// Snapshots arriving faster than a resolve pass completes are coalesced:
/// every pass reads the latest resident state, and a result that was
/// overtaken by newer snapshots mid-resolution is discarded and re-derived
/// instead of being published stale.
pub struct ViewSession {
    store: DocumentStore,
    business_id: String,
    view: ViewKind,
    filters: ViewFilters,
    manager: SubscriptionManager,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    changes: broadcast::Receiver<ChangeEvent>,
    resident: ResidentCache,
    orders: Vec<Order>,
    pager: ProjectPager<DocumentStore>,
    rows_tx: watch::Sender<Vec<ViewRow>>,
    last_error: Option<String>,
}

impl ViewSession {
    /// Open a session for one tenant and start the collection
    /// subscriptions. Must be called from within a tokio runtime.
    pub fn open(store: DocumentStore, business_id: impl Into<String>, view: ViewKind) -> Result<Self> {
        let business_id = business_id.into();

        let clients = TenantQuery::new(Client::collection(), &business_id)?.build();
        let orders = TenantQuery::new(Order::collection(), &business_id)?.build();
        let employees = TenantQuery::new(Employee::collection(), &business_id)?.build();

        let (events_tx, events) = mpsc::unbounded_channel();
        let mut manager = SubscriptionManager::new(store.clone(), events_tx);
        manager.subscribe(SlotKey::Clients, clients);
        manager.subscribe(SlotKey::Orders, orders);
        manager.subscribe(SlotKey::Employees, employees);

        let changes = store.changes();
        let pager = ProjectPager::new(store.clone(), business_id.clone(), DEFAULT_PAGE_SIZE);
        let (rows_tx, _) = watch::channel(Vec::new());

        Ok(ViewSession {
            store,
            business_id,
            view,
            filters: ViewFilters::default(),
            manager,
            events,
            changes,
            resident: ResidentCache::default(),
            orders: Vec::new(),
            pager,
            rows_tx,
            last_error: None,
        })
    }

    /// Watch handle for the derived rows. The value is replaced wholesale
    /// on every published pass.
    pub fn rows(&self) -> watch::Receiver<Vec<ViewRow>> {
        self.rows_tx.subscribe()
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    pub fn filters(&self) -> &ViewFilters {
        &self.filters
    }

    /// Most recent subscription failure, if any. Derived rows stay valid
    /// across failures; the subscription is safe to reopen.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.manager.live_count()
    }

    pub async fn set_view(&mut self, view: ViewKind) -> Result<Vec<ViewRow>> {
        self.view = view;
        self.republish().await
    }

    /// Date-range and search filtering happen in the aggregator, so a
    /// filter change recomputes locally without touching subscriptions.
    pub async fn set_filters(&mut self, filters: ViewFilters) -> Result<Vec<ViewRow>> {
        self.filters = filters;
        self.republish().await
    }

    /// Fetch one page of a client's projects and pin the live projects
    /// subscription to exactly that window.
    pub async fn show_projects_page(&mut self, client_id: &str, page: u32) -> Result<ProjectPage> {
        self.drain_change_feed();
        let fetched = self.pager.get_page(client_id, page).await?;
        let window = self.pager.window_query(client_id, page)?;
        self.manager.subscribe(
            SlotKey::ProjectPage {
                client_id: client_id.to_string(),
            },
            window,
        );
        Ok(fetched)
    }

    /// Wait for the next batch of snapshot deliveries, re-derive the view,
    /// and publish it. Returns `Ok(None)` only when every event source is
    /// gone.
    ///
    /// A store failure mid-pass is returned to the caller; the previously
    /// published rows are left in place.
    pub async fn next_rows(&mut self) -> Result<Option<Vec<ViewRow>>> {
        loop {
            let Some(event) = self.events.recv().await else {
                return Ok(None);
            };
            self.apply(event);
            // Coalesce whatever else is already queued; only the latest
            // snapshot per slot matters.
            while let Ok(event) = self.events.try_recv() {
                self.apply(event);
            }
            self.drain_change_feed();

            let rows = self.derive().await?;
            if !self.events.is_empty() {
                // Overtaken while resolving; drop this result and re-derive
                // from the newer snapshots.
                continue;
            }
            self.rows_tx.send_replace(rows.clone());
            return Ok(Some(rows));
        }
    }

    /// Tear the session down, releasing every live subscription.
    pub fn close(mut self) {
        self.manager.shutdown();
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Snapshot { slot, docs } => match slot {
                SlotKey::Clients => {
                    self.resident.replace_clients(decode_tolerant(&docs));
                }
                SlotKey::Employees => {
                    self.resident.replace_employees(decode_tolerant(&docs));
                }
                SlotKey::Orders => {
                    self.orders = decode_tolerant(&docs);
                }
                SlotKey::ProjectPage { client_id } => {
                    let projects: Vec<Project> = decode_tolerant(&docs);
                    self.resident.replace_projects(&client_id, projects);
                }
            },
            SessionEvent::SubscriptionFailed { slot, message } => {
                log::warn!("subscription {slot:?} failed: {message}");
                self.last_error = Some(message);
            }
        }
    }

    /// Forward structural change events to the paginator so stale cursor
    /// histories are dropped before their next use.
    fn drain_change_feed(&mut self) {
        loop {
            match self.changes.try_recv() {
                Ok(event) => self.pager.handle_change(&event),
                Err(BroadcastTryRecvError::Lagged(skipped)) => {
                    log::debug!("change feed lagged by {skipped}, resetting pagination");
                    self.pager.invalidate_all();
                }
                Err(BroadcastTryRecvError::Empty) | Err(BroadcastTryRecvError::Closed) => break,
            }
        }
    }

    async fn derive(&self) -> Result<Vec<ViewRow>> {
        let resolver = JoinResolver::new(&self.store, &self.business_id);
        let resolved_orders = resolver.resolve_orders(&self.orders, &self.resident).await?;
        let projects = self.resident.all_projects();
        let resolved_projects = resolver.resolve_projects(&projects, &self.resident).await?;
        Ok(aggregate(
            &AggregateInput {
                orders: &resolved_orders,
                projects: &resolved_projects,
            },
            self.view,
            &self.filters,
        ))
    }

    async fn republish(&mut self) -> Result<Vec<ViewRow>> {
        let rows = self.derive().await?;
        self.rows_tx.send_replace(rows.clone());
        Ok(rows)
    }
}

fn decode_tolerant<T: serde::de::DeserializeOwned>(
    docs: &[crate::core::store::Document],
) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode() {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping undecodable document {}/{}: {e}", doc.collection, doc.id);
                None
            }
        })
        .collect()
}
