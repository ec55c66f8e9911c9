mod document;
mod query;
mod state;
mod subscribe;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use document::{ChangeEvent, ChangeKind, CollectionPath, Document};
pub use query::{
    CREATED_AT_FIELD, Cursor, Direction, Filter, OrderBy, Query, TENANT_FIELD, TenantQuery,
};
pub use subscribe::Subscription;

use crate::core::model::{
    Client, ClientRepository, ClientUpdate, Employee, EmployeeRepository, EmployeeUpdate, NewClient,
    NewEmployee, NewOrder, NewProject, Order, OrderRepository, OrderUpdate, Project,
    ProjectRepository, ProjectUpdate,
};
use crate::error::Result;
use state::StoreState;

/// Read interface consumed by the join resolver and the paginator. The
/// store is tenant-unaware on purpose; callers inject tenant scoping
/// through [`TenantQuery`].
pub trait RecordStore {
    fn get_one(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> impl Future<Output = Result<Option<Document>>>;
    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Document>>>;
    fn count(&self, query: &Query) -> impl Future<Output = Result<u64>>;
}

/// SQLite-backed multi-collection document store with a change feed.
///
/// Documents are JSON payloads addressed by `(collection, id)`. Every
/// committed write broadcasts a [`ChangeEvent`], which live subscriptions
/// turn into full-snapshot re-deliveries.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    state: Arc<StoreState>,
}

impl DocumentStore {
    pub async fn open<P: AsRef<Path>>(workspace_file: P) -> Result<Self> {
        Ok(DocumentStore {
            state: Arc::new(StoreState::open(workspace_file).await?),
        })
    }

    pub async fn insert<T: Serialize>(
        &self,
        collection: &CollectionPath,
        id: &str,
        record: &T,
    ) -> Result<()> {
        let key = collection.storage_key();
        let data = serde_json::to_string(record).map_err(crate::error::Error::from)?;
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(&key)
            .bind(id)
            .bind(data)
            .execute(self.state.pool())
            .await?;
        self.state.publish(ChangeEvent {
            collection: key,
            doc_id: id.to_string(),
            kind: ChangeKind::Created,
        });
        Ok(())
    }

    /// Replaces an existing document. Returns `false` when no document with
    /// that id exists; no change event is published in that case.
    pub async fn update<T: Serialize>(
        &self,
        collection: &CollectionPath,
        id: &str,
        record: &T,
    ) -> Result<bool> {
        let key = collection.storage_key();
        let data = serde_json::to_string(record).map_err(crate::error::Error::from)?;
        let result = sqlx::query("UPDATE documents SET data = ? WHERE collection = ? AND id = ?")
            .bind(data)
            .bind(&key)
            .bind(id)
            .execute(self.state.pool())
            .await?;
        let changed = result.rows_affected() > 0;
        if changed {
            self.state.publish(ChangeEvent {
                collection: key,
                doc_id: id.to_string(),
                kind: ChangeKind::Updated,
            });
        }
        Ok(changed)
    }

    /// Hard delete. Returns `false` when the document was already gone.
    pub async fn delete(&self, collection: &CollectionPath, id: &str) -> Result<bool> {
        let key = collection.storage_key();
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(&key)
            .bind(id)
            .execute(self.state.pool())
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            self.state.publish(ChangeEvent {
                collection: key,
                doc_id: id.to_string(),
                kind: ChangeKind::Deleted,
            });
        }
        Ok(deleted)
    }

    pub async fn get_one(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<Document>> {
        let key = collection.storage_key();
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(&key)
            .bind(id)
            .fetch_optional(self.state.pool())
            .await?;
        match row {
            Some(row) => {
                let raw: String = row.get("data");
                let data: Value = serde_json::from_str(&raw).map_err(crate::error::Error::from)?;
                Ok(Some(Document {
                    collection: key,
                    id: id.to_string(),
                    data,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let (sql, binds) = query.select_sql();
        let mut prepared = sqlx::query(&sql);
        for value in &binds {
            prepared = bind_value(prepared, value);
        }
        let rows = prepared.fetch_all(self.state.pool()).await?;
        let key = query.collection.storage_key();
        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let raw: String = row.get("data");
            let data: Value = serde_json::from_str(&raw).map_err(crate::error::Error::from)?;
            docs.push(Document {
                collection: key.clone(),
                id,
                data,
            });
        }
        Ok(docs)
    }

    /// Size of the unpaginated result set for `query` (cursor and limit are
    /// ignored).
    pub async fn count(&self, query: &Query) -> Result<u64> {
        let (sql, binds) = query.count_sql();
        let mut prepared = sqlx::query(&sql);
        for value in &binds {
            prepared = bind_value(prepared, value);
        }
        let row = prepared.fetch_one(self.state.pool()).await?;
        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }

    /// Open a live query. The subscription delivers the full current result
    /// set immediately and again after every relevant write.
    pub fn subscribe(&self, query: Query) -> Subscription {
        Subscription::new(self.clone(), query, self.state.subscribe_changes())
    }

    /// Raw change feed, one event per committed write across the whole
    /// store.
    pub fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.state.subscribe_changes()
    }

    fn decode_all<T: serde::de::DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>> {
        docs.iter().map(Document::decode).collect()
    }
}

impl RecordStore for DocumentStore {
    async fn get_one(&self, collection: &CollectionPath, id: &str) -> Result<Option<Document>> {
        DocumentStore::get_one(self, collection, id).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        DocumentStore::query(self, query).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        DocumentStore::count(self, query).await
    }
}

impl ClientRepository for DocumentStore {
    async fn add_client(&self, business_id: &str, client: NewClient) -> Result<Client> {
        let record = Client {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            name: client.name,
            email: client.email,
            phone: client.phone,
            company: client.company,
            tags: client.tags,
            budget: client.budget,
            status: client.status,
            created_at: OffsetDateTime::now_utc(),
        };
        self.insert(&Client::collection(), &record.id, &record)
            .await?;
        Ok(record)
    }

    async fn get_clients(&self, business_id: &str) -> Result<Vec<Client>> {
        let query = TenantQuery::new(Client::collection(), business_id)?.build();
        Self::decode_all(self.query(&query).await?)
    }

    async fn get_client_by_id(&self, business_id: &str, id: &str) -> Result<Option<Client>> {
        match self.get_one(&Client::collection(), id).await? {
            Some(doc) => {
                let client: Client = doc.decode()?;
                if client.business_id != business_id {
                    log::warn!("client {id} belongs to another business, denying access");
                    return Ok(None);
                }
                Ok(Some(client))
            }
            None => Ok(None),
        }
    }

    async fn update_client(&self, client: &Client, update: &ClientUpdate) -> Result<Client> {
        let record = Client {
            id: client.id.clone(),
            business_id: client.business_id.clone(),
            name: update.name.clone().unwrap_or_else(|| client.name.clone()),
            email: resolve_nullable(&update.email, &client.email),
            phone: resolve_nullable(&update.phone, &client.phone),
            company: resolve_nullable(&update.company, &client.company),
            tags: update.tags.clone().unwrap_or_else(|| client.tags.clone()),
            budget: update.budget.unwrap_or(client.budget),
            status: update.status.unwrap_or(client.status),
            created_at: client.created_at,
        };
        self.update(&Client::collection(), &record.id, &record)
            .await?;
        Ok(record)
    }

    async fn delete_client(&self, client: Client) -> Result<()> {
        self.delete(&Client::collection(), &client.id).await?;
        Ok(())
    }
}

impl ProjectRepository for DocumentStore {
    async fn add_project(&self, client: &Client, project: NewProject) -> Result<Project> {
        let record = Project {
            id: Uuid::new_v4().to_string(),
            business_id: client.business_id.clone(),
            client_id: client.id.clone(),
            name: project.name,
            budget: project.budget,
            deadline: project.deadline,
            requirements: project.requirements,
            status: project.status,
            created_at: OffsetDateTime::now_utc(),
        };
        self.insert(&record.collection(), &record.id, &record)
            .await?;
        Ok(record)
    }

    async fn get_projects(&self, client: &Client) -> Result<Vec<Project>> {
        let query = TenantQuery::new(client.projects_collection(), &client.business_id)?.build();
        Self::decode_all(self.query(&query).await?)
    }

    async fn get_project_by_id(
        &self,
        business_id: &str,
        client_id: &str,
        id: &str,
    ) -> Result<Option<Project>> {
        let collection = CollectionPath::projects_of(client_id);
        match self.get_one(&collection, id).await? {
            Some(doc) => {
                let project: Project = doc.decode()?;
                if project.business_id != business_id {
                    log::warn!("project {id} belongs to another business, denying access");
                    return Ok(None);
                }
                Ok(Some(project))
            }
            None => Ok(None),
        }
    }

    async fn update_project(&self, project: &Project, update: &ProjectUpdate) -> Result<Project> {
        let record = Project {
            id: project.id.clone(),
            business_id: project.business_id.clone(),
            client_id: project.client_id.clone(),
            name: update.name.clone().unwrap_or_else(|| project.name.clone()),
            budget: update.budget.unwrap_or(project.budget),
            deadline: update.deadline.unwrap_or(project.deadline),
            requirements: resolve_nullable(&update.requirements, &project.requirements),
            status: resolve_nullable(&update.status, &project.status),
            created_at: project.created_at,
        };
        self.update(&record.collection(), &record.id, &record)
            .await?;
        Ok(record)
    }

    async fn delete_project(&self, project: Project) -> Result<()> {
        self.delete(&project.collection(), &project.id).await?;
        Ok(())
    }
}

impl OrderRepository for DocumentStore {
    async fn add_order(&self, business_id: &str, order: NewOrder) -> Result<Order> {
        let record = Order {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            title: order.title,
            description: order.description,
            amount: order.amount,
            deadline: order.deadline,
            status: order.status,
            client_id: order.client_id,
            project_id: order.project_id,
            employee_id: order.employee_id,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        self.insert(&Order::collection(), &record.id, &record)
            .await?;
        Ok(record)
    }

    async fn get_orders(&self, business_id: &str) -> Result<Vec<Order>> {
        let query = TenantQuery::new(Order::collection(), business_id)?.build();
        Self::decode_all(self.query(&query).await?)
    }

    async fn get_order_by_id(&self, business_id: &str, id: &str) -> Result<Option<Order>> {
        match self.get_one(&Order::collection(), id).await? {
            Some(doc) => {
                let order: Order = doc.decode()?;
                if order.business_id != business_id {
                    log::warn!("order {id} belongs to another business, denying access");
                    return Ok(None);
                }
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn update_order(&self, order: &Order, update: &OrderUpdate) -> Result<Order> {
        let record = Order {
            id: order.id.clone(),
            business_id: order.business_id.clone(),
            title: update.title.clone().unwrap_or_else(|| order.title.clone()),
            description: resolve_nullable(&update.description, &order.description),
            amount: update.amount.unwrap_or(order.amount),
            deadline: update.deadline.unwrap_or(order.deadline),
            status: update.status.unwrap_or(order.status),
            client_id: order.client_id.clone(),
            project_id: order.project_id.clone(),
            employee_id: order.employee_id.clone(),
            created_at: order.created_at,
            updated_at: Some(OffsetDateTime::now_utc()),
        };
        self.update(&Order::collection(), &record.id, &record)
            .await?;
        Ok(record)
    }

    async fn delete_order(&self, order: Order) -> Result<()> {
        self.delete(&Order::collection(), &order.id).await?;
        Ok(())
    }
}

impl EmployeeRepository for DocumentStore {
    async fn add_employee(&self, business_id: &str, employee: NewEmployee) -> Result<Employee> {
        let record = Employee {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            name: employee.name,
            email: employee.email,
            phone: employee.phone,
            skills: employee.skills,
            experience: employee.experience,
            status: employee.status,
            created_at: OffsetDateTime::now_utc(),
        };
        self.insert(&Employee::collection(), &record.id, &record)
            .await?;
        Ok(record)
    }

    async fn get_employees(&self, business_id: &str) -> Result<Vec<Employee>> {
        let query = TenantQuery::new(Employee::collection(), business_id)?.build();
        Self::decode_all(self.query(&query).await?)
    }

    async fn get_employee_by_id(&self, business_id: &str, id: &str) -> Result<Option<Employee>> {
        match self.get_one(&Employee::collection(), id).await? {
            Some(doc) => {
                let employee: Employee = doc.decode()?;
                if employee.business_id != business_id {
                    log::warn!("employee {id} belongs to another business, denying access");
                    return Ok(None);
                }
                Ok(Some(employee))
            }
            None => Ok(None),
        }
    }

    async fn update_employee(
        &self,
        employee: &Employee,
        update: &EmployeeUpdate,
    ) -> Result<Employee> {
        let record = Employee {
            id: employee.id.clone(),
            business_id: employee.business_id.clone(),
            name: update
                .name
                .clone()
                .unwrap_or_else(|| employee.name.clone()),
            email: resolve_nullable(&update.email, &employee.email),
            phone: resolve_nullable(&update.phone, &employee.phone),
            skills: update
                .skills
                .clone()
                .unwrap_or_else(|| employee.skills.clone()),
            experience: resolve_nullable(&update.experience, &employee.experience),
            status: update.status.unwrap_or(employee.status),
            created_at: employee.created_at,
        };
        self.update(&Employee::collection(), &record.id, &record)
            .await?;
        Ok(record)
    }

    async fn delete_employee(&self, employee: Employee) -> Result<()> {
        self.delete(&Employee::collection(), &employee.id).await?;
        Ok(())
    }
}

/// `Some(None)` clears the field, `Some(Some(v))` replaces it, `None` keeps
/// the current value.
fn resolve_nullable<T: Clone>(update: &Option<Option<T>>, current: &Option<T>) -> Option<T> {
    match update {
        Some(value) => value.clone(),
        None => current.clone(),
    }
}

fn bind_value<'q>(
    prepared: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => prepared.bind(Option::<String>::None),
        Value::Bool(flag) => prepared.bind(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                prepared.bind(int)
            } else {
                prepared.bind(number.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(text) => prepared.bind(text.clone()),
        other => prepared.bind(other.to_string()),
    }
}
