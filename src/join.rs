use std::collections::HashMap;

use crate::core::model::{Client, Employee, Order, Project};
use crate::core::store::{CollectionPath, Document, RecordStore};
use crate::error::Result;

/// Display value substituted when a reference cannot be resolved: the
/// target is gone, belongs to another tenant, or was never set.
pub const MISSING_LABEL: &str = "N/A";

/// Records already delivered by live subscriptions, indexed for join
/// lookups. Point reads only happen for references that miss this cache.
#[derive(Debug, Default)]
pub struct ResidentCache {
    pub clients: HashMap<String, Client>,
    pub employees: HashMap<String, Employee>,
    /// Projects currently resident, grouped by owning client id.
    pub projects: HashMap<String, Vec<Project>>,
}

impl ResidentCache {
    pub fn replace_clients(&mut self, clients: Vec<Client>) {
        self.clients = clients
            .into_iter()
            .map(|client| (client.id.clone(), client))
            .collect();
        // A client that disappeared takes its cached project window with it.
        self.projects
            .retain(|client_id, _| self.clients.contains_key(client_id));
    }

    pub fn replace_employees(&mut self, employees: Vec<Employee>) {
        self.employees = employees
            .into_iter()
            .map(|employee| (employee.id.clone(), employee))
            .collect();
    }

    pub fn replace_projects(&mut self, client_id: &str, projects: Vec<Project>) {
        self.projects.insert(client_id.to_string(), projects);
    }

    pub fn project(&self, client_id: &str, project_id: &str) -> Option<&Project> {
        self.projects
            .get(client_id)?
            .iter()
            .find(|project| project.id == project_id)
    }

    pub fn all_projects(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.projects.values().flatten().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        projects
    }
}

/// An order with its references resolved to display values. `client`,
/// `project` and `employee` stay `None` when the reference could not be
/// resolved; the corresponding name fields then carry [`MISSING_LABEL`].
#[derive(Debug, Clone)]
pub struct ResolvedOrder {
    pub order: Order,
    pub client_name: String,
    pub project_name: String,
    pub employee_name: String,
    pub client: Option<Client>,
    pub project: Option<Project>,
    pub employee: Option<Employee>,
}

/// A project with its owning client resolved.
#[derive(Debug, Clone)]
pub struct ResolvedProject {
    pub project: Project,
    pub client_name: String,
}

/// Resolves foreign keys for a batch of records, preferring resident
/// records and falling back to deduplicated point reads against the store.
///
/// A reference that resolves to nothing, or to a record of another tenant,
/// degrades to [`MISSING_LABEL`] instead of failing the batch; integrity is
/// enforced at write time, not here. Store failures do propagate: the
/// caller keeps its previous derived state and retries.
pub struct JoinResolver<'a, S> {
    store: &'a S,
    business_id: &'a str,
}

type PointReadMemo = HashMap<(String, String), Option<Document>>;

impl<'a, S: RecordStore> JoinResolver<'a, S> {
    pub fn new(store: &'a S, business_id: &'a str) -> Self {
        JoinResolver { store, business_id }
    }

    pub async fn resolve_orders(
        &self,
        orders: &[Order],
        resident: &ResidentCache,
    ) -> Result<Vec<ResolvedOrder>> {
        let mut memo = PointReadMemo::new();
        let mut resolved = Vec::with_capacity(orders.len());
        for order in orders {
            if order.business_id != self.business_id {
                log::warn!("dropping order {} from another business", order.id);
                continue;
            }

            let client = match resident.clients.get(&order.client_id) {
                Some(client) => Some(client.clone()),
                None => {
                    self.fetch::<Client>(
                        &CollectionPath::Clients,
                        &order.client_id,
                        &mut memo,
                        |client| &client.business_id,
                    )
                    .await?
                }
            };

            let employee = match resident.employees.get(&order.employee_id) {
                Some(employee) => Some(employee.clone()),
                None => {
                    self.fetch::<Employee>(
                        &CollectionPath::Employees,
                        &order.employee_id,
                        &mut memo,
                        |employee| &employee.business_id,
                    )
                    .await?
                }
            };

            let project = match &order.project_id {
                None => None,
                Some(project_id) => {
                    match resident.project(&order.client_id, project_id) {
                        Some(project) => Some(project.clone()),
                        None => {
                            self.fetch::<Project>(
                                &CollectionPath::projects_of(order.client_id.clone()),
                                project_id,
                                &mut memo,
                                |project| &project.business_id,
                            )
                            .await?
                        }
                    }
                }
            };

            resolved.push(ResolvedOrder {
                client_name: client
                    .as_ref()
                    .map_or_else(|| MISSING_LABEL.to_string(), |c| c.name.clone()),
                project_name: project
                    .as_ref()
                    .map_or_else(|| MISSING_LABEL.to_string(), |p| p.name.clone()),
                employee_name: employee
                    .as_ref()
                    .map_or_else(|| MISSING_LABEL.to_string(), |e| e.name.clone()),
                order: order.clone(),
                client,
                project,
                employee,
            });
        }
        Ok(resolved)
    }

    pub async fn resolve_projects(
        &self,
        projects: &[Project],
        resident: &ResidentCache,
    ) -> Result<Vec<ResolvedProject>> {
        let mut memo = PointReadMemo::new();
        let mut resolved = Vec::with_capacity(projects.len());
        for project in projects {
            if project.business_id != self.business_id {
                log::warn!("dropping project {} from another business", project.id);
                continue;
            }
            let client = match resident.clients.get(&project.client_id) {
                Some(client) => Some(client.clone()),
                None => {
                    self.fetch::<Client>(
                        &CollectionPath::Clients,
                        &project.client_id,
                        &mut memo,
                        |client| &client.business_id,
                    )
                    .await?
                }
            };
            resolved.push(ResolvedProject {
                client_name: client
                    .as_ref()
                    .map_or_else(|| MISSING_LABEL.to_string(), |c| c.name.clone()),
                project: project.clone(),
            });
        }
        Ok(resolved)
    }

    /// One-shot point read, memoized per resolution pass so N references to
    /// the same record cost at most one store read. Cross-tenant hits and
    /// undecodable payloads resolve to `None`.
    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        collection: &CollectionPath,
        id: &str,
        memo: &mut PointReadMemo,
        tenant_of: impl Fn(&T) -> &String,
    ) -> Result<Option<T>> {
        let key = (collection.storage_key(), id.to_string());
        let doc = match memo.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                log::debug!("point read {}/{id}", key.0);
                let fetched = self.store.get_one(collection, id).await?;
                memo.insert(key.clone(), fetched.clone());
                fetched
            }
        };
        let Some(doc) = doc else {
            return Ok(None);
        };
        let record: T = match doc.decode() {
            Ok(record) => record,
            Err(e) => {
                log::warn!("undecodable document {}/{id}: {e}", key.0);
                return Ok(None);
            }
        };
        if tenant_of(&record) != self.business_id {
            log::warn!("reference {}/{id} crosses tenants, treating as missing", key.0);
            return Ok(None);
        }
        Ok(Some(record))
    }
}
