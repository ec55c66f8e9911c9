use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::model::client::Client;
use crate::core::model::status::OrderStatus;
use crate::core::store::CollectionPath;
use crate::error::Result;

/// A unit of work owned by exactly one client. Lives in the client's nested
/// collection; deleting the client orphans nothing because cached projects
/// are invalidated alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub business_id: String,
    pub client_id: String,
    pub name: String,
    pub budget: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: OffsetDateTime,
    #[serde(default)]
    pub requirements: Option<String>,
    /// Stored workflow state. The displayed state prefers the latest
    /// associated order's status; see the rollup layer.
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Project {
    pub fn collection(&self) -> CollectionPath {
        CollectionPath::projects_of(self.client_id.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub budget: f64,
    pub deadline: OffsetDateTime,
    pub requirements: Option<String>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub budget: Option<f64>,
    pub deadline: Option<OffsetDateTime>,
    pub requirements: Option<Option<String>>,
    pub status: Option<Option<OrderStatus>>,
}

pub trait ProjectRepository {
    fn add_project(
        &self,
        client: &Client,
        project: NewProject,
    ) -> impl Future<Output = Result<Project>>;
    fn get_projects(&self, client: &Client) -> impl Future<Output = Result<Vec<Project>>>;
    fn get_project_by_id(
        &self,
        business_id: &str,
        client_id: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Project>>>;
    fn update_project(
        &self,
        project: &Project,
        update: &ProjectUpdate,
    ) -> impl Future<Output = Result<Project>>;
    fn delete_project(&self, project: Project) -> impl Future<Output = Result<()>>;
}
