use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::model::status::OrderStatus;
use crate::core::store::CollectionPath;
use crate::error::Result;

/// Work commissioned from an employee for a client, optionally attached to
/// one of the client's projects. References are fixed at creation time; an
/// order is never re-parented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub business_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub deadline: OffsetDateTime,
    pub status: OrderStatus,
    pub client_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub employee_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Order {
    pub fn collection() -> CollectionPath {
        CollectionPath::Orders
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    pub deadline: OffsetDateTime,
    pub status: OrderStatus,
    pub client_id: String,
    pub project_id: Option<String>,
    pub employee_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub amount: Option<f64>,
    pub deadline: Option<OffsetDateTime>,
    pub status: Option<OrderStatus>,
}

pub trait OrderRepository {
    fn add_order(&self, business_id: &str, order: NewOrder)
    -> impl Future<Output = Result<Order>>;
    fn get_orders(&self, business_id: &str) -> impl Future<Output = Result<Vec<Order>>>;
    fn get_order_by_id(
        &self,
        business_id: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Order>>>;
    fn update_order(
        &self,
        order: &Order,
        update: &OrderUpdate,
    ) -> impl Future<Output = Result<Order>>;
    fn delete_order(&self, order: Order) -> impl Future<Output = Result<()>>;
}
