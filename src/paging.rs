use std::collections::HashMap;

use serde_json::Value;

use crate::core::model::Project;
use crate::core::store::{
    ChangeEvent, CollectionPath, Cursor, Query, RecordStore, TenantQuery,
};
use crate::error::{Error, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A project plus its presentational row ordinal. The ordinal is derived
/// from page position at fetch time and is meaningless across requests.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedProject {
    pub serial_no: u32,
    pub project: Project,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPage {
    pub page: u32,
    pub records: Vec<PagedProject>,
    pub total: u64,
    pub has_more: bool,
}

/// Per-parent pagination state for one client's project list.
#[derive(Debug, Default)]
struct ParentSession {
    /// `cursors[n]` marks the last record of page `n + 1`.
    cursors: Vec<Cursor>,
    /// Unpaginated result-set size, fetched once per parent.
    total: Option<u64>,
}

/// Keyset pagination over the nested projects collection.
///
/// Cursors are positional: they are recorded per visited page, reused when
/// navigating backward, and only valid for the page size and ordering this
/// pager was built with. Any create or delete under a parent invalidates
/// that parent's history and restarts it at page 1.
pub struct ProjectPager<S> {
    store: S,
    business_id: String,
    page_size: u32,
    sessions: HashMap<String, ParentSession>,
}

impl<S: RecordStore> ProjectPager<S> {
    pub fn new(store: S, business_id: impl Into<String>, page_size: u32) -> Self {
        ProjectPager {
            store,
            business_id: business_id.into(),
            page_size: page_size.max(1),
            sessions: HashMap::new(),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub async fn get_page(&mut self, client_id: &str, page: u32) -> Result<ProjectPage> {
        let start_after = self.cursor_for(client_id, page)?;

        let total = match self.sessions.get(client_id).and_then(|s| s.total) {
            Some(total) => total,
            None => {
                let base = self.base_query(client_id)?;
                let total = self.store.count(&base).await?;
                self.sessions
                    .entry(client_id.to_string())
                    .or_default()
                    .total = Some(total);
                total
            }
        };

        let query = self.window(client_id, start_after)?;
        let docs = self.store.query(&query).await?;

        if let Some(last) = docs.last() {
            let cursor = Cursor {
                sort_value: last
                    .field(&query.order_by.field)
                    .cloned()
                    .unwrap_or(Value::Null),
                doc_id: last.id.clone(),
            };
            let session = self.sessions.entry(client_id.to_string()).or_default();
            let slot = (page - 1) as usize;
            if slot < session.cursors.len() {
                session.cursors[slot] = cursor;
            } else {
                session.cursors.push(cursor);
            }
        }

        let mut records = Vec::with_capacity(docs.len());
        for (index, doc) in docs.iter().enumerate() {
            records.push(PagedProject {
                serial_no: (page - 1) * self.page_size + index as u32 + 1,
                project: doc.decode()?,
            });
        }

        Ok(ProjectPage {
            page,
            records,
            total,
            has_more: u64::from(page) < total.div_ceil(u64::from(self.page_size)),
        })
    }

    /// The live query covering an already-fetched page, for keeping a
    /// subscription pinned to the window currently on screen.
    pub fn window_query(&self, client_id: &str, page: u32) -> Result<Query> {
        let start_after = self.cursor_for(client_id, page)?;
        self.window(client_id, start_after)
    }

    /// Drop a parent's cursor history and cached total; the next request
    /// must start over at page 1.
    pub fn invalidate(&mut self, client_id: &str) {
        if self.sessions.remove(client_id).is_some() {
            log::debug!("pagination history for client {client_id} invalidated");
        }
    }

    /// Drop every parent's history, for when the change feed cannot say
    /// which parents were touched.
    pub fn invalidate_all(&mut self) {
        if !self.sessions.is_empty() {
            log::debug!("pagination history for all clients invalidated");
            self.sessions.clear();
        }
    }

    /// Feed store change events through; creates and deletes under a
    /// subscribed parent shift record positions and void its cursors.
    pub fn handle_change(&mut self, event: &ChangeEvent) {
        if !event.is_structural() {
            return;
        }
        if let Some(CollectionPath::Projects { client_id }) =
            CollectionPath::parse(&event.collection)
        {
            self.invalidate(&client_id);
        }
    }

    fn cursor_for(&self, client_id: &str, page: u32) -> Result<Option<Cursor>> {
        let missing = |page: u32| Error::PaginationSequence {
            parent: client_id.to_string(),
            page,
        };
        match page {
            0 => Err(missing(0)),
            1 => Ok(None),
            n => self
                .sessions
                .get(client_id)
                .and_then(|s| s.cursors.get((n - 2) as usize))
                .cloned()
                .map(Some)
                .ok_or_else(|| missing(n)),
        }
    }

    fn base_query(&self, client_id: &str) -> Result<Query> {
        Ok(TenantQuery::new(
            CollectionPath::projects_of(client_id),
            &self.business_id,
        )?
        .build())
    }

    fn window(&self, client_id: &str, start_after: Option<Cursor>) -> Result<Query> {
        let mut query = TenantQuery::new(
            CollectionPath::projects_of(client_id),
            &self.business_id,
        )?
        .limit(self.page_size);
        if let Some(cursor) = start_after {
            query = query.start_after(cursor);
        }
        Ok(query.build())
    }
}
