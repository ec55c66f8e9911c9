use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

/// Address of a collection inside the store.
///
/// Top-level collections hold clients, orders and employees; projects live
/// in a nested collection owned by their client
/// (`clients/{clientId}/projects`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionPath {
    Clients,
    Orders,
    Employees,
    Projects { client_id: String },
}

impl CollectionPath {
    pub fn projects_of(client_id: impl Into<String>) -> Self {
        CollectionPath::Projects {
            client_id: client_id.into(),
        }
    }

    /// The string form used as the `collection` column and in change events.
    pub fn storage_key(&self) -> String {
        match self {
            CollectionPath::Clients => "clients".to_string(),
            CollectionPath::Orders => "orders".to_string(),
            CollectionPath::Employees => "employees".to_string(),
            CollectionPath::Projects { client_id } => format!("clients/{client_id}/projects"),
        }
    }

    pub fn parse(key: &str) -> Option<CollectionPath> {
        match key {
            "clients" => return Some(CollectionPath::Clients),
            "orders" => return Some(CollectionPath::Orders),
            "employees" => return Some(CollectionPath::Employees),
            _ => {}
        }
        let mut parts = key.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("clients"), Some(client_id), Some("projects"), None) if !client_id.is_empty() => {
                Some(CollectionPath::projects_of(client_id))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// A raw record as the store delivers it: collection key, document id and
/// the JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub collection: String,
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// A single top-level field of the payload, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Change notification broadcast by the store after every committed write.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub doc_id: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeEvent {
    /// Creates and deletes shift every record behind them; updates keep the
    /// result-set shape intact.
    pub fn is_structural(&self) -> bool {
        matches!(self.kind, ChangeKind::Created | ChangeKind::Deleted)
    }
}
