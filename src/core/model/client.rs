use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::model::status::AccountStatus;
use crate::core::store::CollectionPath;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub budget: f64,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Client {
    pub fn collection() -> CollectionPath {
        CollectionPath::Clients
    }

    /// Collection holding this client's projects.
    pub fn projects_collection(&self) -> CollectionPath {
        CollectionPath::projects_of(self.id.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub tags: Vec<String>,
    pub budget: f64,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub budget: Option<f64>,
    pub status: Option<AccountStatus>,
}

pub trait ClientRepository {
    fn add_client(
        &self,
        business_id: &str,
        client: NewClient,
    ) -> impl Future<Output = Result<Client>>;
    fn get_clients(&self, business_id: &str) -> impl Future<Output = Result<Vec<Client>>>;
    fn get_client_by_id(
        &self,
        business_id: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Client>>>;
    fn update_client(
        &self,
        client: &Client,
        update: &ClientUpdate,
    ) -> impl Future<Output = Result<Client>>;
    fn delete_client(&self, client: Client) -> impl Future<Output = Result<()>>;
}
