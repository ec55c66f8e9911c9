use anyhow::Context;
use tempfile::TempDir;
use time::OffsetDateTime;

use opsledger::core::model::{
    AccountStatus, NewClient, NewEmployee, NewOrder, NewProject, Order, OrderStatus,
};
use opsledger::core::store::DocumentStore;
use opsledger::join::{MISSING_LABEL, ResolvedOrder};
use opsledger::{ViewRow, ViewSession};

/// Tenant used by most tests.
pub const BUSINESS: &str = "biz-primary";
/// A second tenant for isolation tests.
pub const OTHER_BUSINESS: &str = "biz-other";

/// Opens a store backed by a fresh workspace file. Keep the TempDir alive
/// for the duration of the test.
pub async fn create_test_store() -> (DocumentStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("workspace.db");
    let store = DocumentStore::open(&path)
        .await
        .expect("Failed to open test store");
    (store, dir)
}

pub fn make_client(name: &str, budget: f64) -> NewClient {
    NewClient {
        name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
        phone: None,
        company: None,
        tags: vec!["test".to_string()],
        budget,
        status: AccountStatus::Active,
    }
}

pub fn make_employee(name: &str) -> NewEmployee {
    NewEmployee {
        name: name.to_string(),
        email: None,
        phone: None,
        skills: vec!["engineering".to_string()],
        experience: Some("3 years".to_string()),
        status: AccountStatus::Active,
    }
}

pub fn make_project(name: &str, budget: f64) -> NewProject {
    NewProject {
        name: name.to_string(),
        budget,
        deadline: OffsetDateTime::now_utc(),
        requirements: None,
        status: None,
    }
}

pub fn make_order(
    title: &str,
    amount: f64,
    client_id: &str,
    project_id: Option<&str>,
    employee_id: &str,
) -> NewOrder {
    NewOrder {
        title: title.to_string(),
        description: None,
        amount,
        deadline: OffsetDateTime::now_utc(),
        status: OrderStatus::Pending,
        client_id: client_id.to_string(),
        project_id: project_id.map(str::to_string),
        employee_id: employee_id.to_string(),
    }
}

/// Builds an order record directly, without the store, for pure rollup
/// tests that need fixed timestamps.
pub fn order_at(
    id: &str,
    title: &str,
    amount: f64,
    status: OrderStatus,
    project_id: Option<&str>,
    created_at: OffsetDateTime,
) -> Order {
    Order {
        id: id.to_string(),
        business_id: BUSINESS.to_string(),
        title: title.to_string(),
        description: None,
        amount,
        deadline: created_at,
        status,
        client_id: "client-1".to_string(),
        project_id: project_id.map(str::to_string),
        employee_id: "employee-1".to_string(),
        created_at,
        updated_at: None,
    }
}

/// Wraps an order as if the resolver had found every reference.
pub fn resolved(order: Order, client_name: &str, employee_name: &str) -> ResolvedOrder {
    ResolvedOrder {
        client_name: client_name.to_string(),
        project_name: MISSING_LABEL.to_string(),
        employee_name: employee_name.to_string(),
        order,
        client: None,
        project: None,
        employee: None,
    }
}

/// Drives the session until the published rows satisfy the predicate,
/// with a hard timeout so a missed delivery fails loudly instead of
/// hanging the test.
pub async fn pump_until<F>(session: &mut ViewSession, mut pred: F) -> anyhow::Result<Vec<ViewRow>>
where
    F: FnMut(&[ViewRow]) -> bool,
{
    for _ in 0..50 {
        let rows = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            session.next_rows(),
        )
        .await
        .context("timed out waiting for view rows")??
        .context("session event channel closed")?;
        if pred(&rows) {
            return Ok(rows);
        }
    }
    anyhow::bail!("condition not reached after 50 aggregation passes")
}
