use serde_json::Value;

use crate::core::store::document::CollectionPath;
use crate::error::{Error, Result};

/// Field every tenant-scoped document carries.
pub const TENANT_FIELD: &str = "businessId";

/// Field used for the default ordering of every collection.
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }

    fn comparator(self) -> &'static str {
        match self {
            Direction::Ascending => ">",
            Direction::Descending => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn created_at_desc() -> Self {
        OrderBy {
            field: CREATED_AT_FIELD.to_string(),
            direction: Direction::Descending,
        }
    }
}

/// Equality predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

/// Opaque pagination cursor: the ordering key of the last record of a page.
/// Only valid for the exact (collection, filters, ordering) it was produced
/// from.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub sort_value: Value,
    pub doc_id: String,
}

/// A read/subscribe request against the store. The store itself is
/// tenant-unaware; use [`TenantQuery`] to build one of these with the tenant
/// filter injected.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
    pub order_by: OrderBy,
    pub limit: Option<u32>,
    pub start_after: Option<Cursor>,
}

impl Query {
    pub fn matches_event_collection(&self, collection_key: &str) -> bool {
        self.collection.storage_key() == collection_key
    }

    /// `SELECT id, data` statement plus bind values, in bind order.
    pub(crate) fn select_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut binds = vec![Value::String(self.collection.storage_key())];

        for filter in &self.filters {
            sql.push_str(&format!(" AND {} = ?", json_field(&filter.field)));
            binds.push(filter.value.clone());
        }

        if let Some(cursor) = &self.start_after {
            let field = json_field(&self.order_by.field);
            let cmp = self.order_by.direction.comparator();
            sql.push_str(&format!(
                " AND ({field} {cmp} ? OR ({field} = ? AND id {cmp} ?))"
            ));
            binds.push(cursor.sort_value.clone());
            binds.push(cursor.sort_value.clone());
            binds.push(Value::String(cursor.doc_id.clone()));
        }

        let dir = self.order_by.direction.sql();
        sql.push_str(&format!(
            " ORDER BY {} {dir}, id {dir}",
            json_field(&self.order_by.field)
        ));

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            binds.push(Value::from(limit as i64));
        }

        (sql, binds)
    }

    /// `SELECT COUNT(*)` over the unpaginated result set: same collection
    /// and filters, no cursor, no limit.
    pub(crate) fn count_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT COUNT(*) FROM documents WHERE collection = ?");
        let mut binds = vec![Value::String(self.collection.storage_key())];
        for filter in &self.filters {
            sql.push_str(&format!(" AND {} = ?", json_field(&filter.field)));
            binds.push(filter.value.clone());
        }
        (sql, binds)
    }
}

/// Builder for queries scoped to one tenant. Injects the tenant equality
/// filter on every query and refuses to build without a tenant id.
#[derive(Debug, Clone)]
pub struct TenantQuery {
    query: Query,
}

impl TenantQuery {
    pub fn new(collection: CollectionPath, business_id: &str) -> Result<Self> {
        let business_id = business_id.trim();
        if business_id.is_empty() {
            return Err(Error::MissingTenant);
        }
        Ok(TenantQuery {
            query: Query {
                collection,
                filters: vec![Filter {
                    field: TENANT_FIELD.to_string(),
                    value: Value::String(business_id.to_string()),
                }],
                order_by: OrderBy::created_at_desc(),
                limit: None,
                start_after: None,
            },
        })
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.query.order_by = OrderBy {
            field: field.into(),
            direction,
        };
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.query.start_after = Some(cursor);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// `json_extract` expression for a top-level field. Field names are crate
/// constants; anything else is stripped to the safe character set.
fn json_field(field: &str) -> String {
    let safe: String = field
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    format!("json_extract(data, '$.{safe}')")
}
