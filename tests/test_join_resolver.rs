//! Tests for foreign-key resolution: completeness, graceful degradation of
//! dangling and cross-tenant references, and point-read deduplication.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;

/// Store wrapper that counts point reads passing through to the backend.
struct CountingStore {
    inner: DocumentStore,
    point_reads: Arc<AtomicUsize>,
}

impl RecordStore for CountingStore {
    async fn get_one(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> opsledger::Result<Option<Document>> {
        self.point_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_one(collection, id).await
    }

    async fn query(&self, query: &Query) -> opsledger::Result<Vec<Document>> {
        self.inner.query(query).await
    }

    async fn count(&self, query: &Query) -> opsledger::Result<u64> {
        self.inner.count(query).await
    }
}

#[tokio::test]
async fn test_valid_references_resolve_to_names() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;

    let client = store.add_client(BUSINESS, make_client("Acme", 5_000.0)).await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;
    let project = store.add_project(&client, make_project("Webshop", 3_000.0)).await?;
    let order = store
        .add_order(
            BUSINESS,
            make_order("Design", 500.0, &client.id, Some(&project.id), &employee.id),
        )
        .await?;

    // Resolve against an empty resident cache: everything goes through
    // point reads.
    let resolver = JoinResolver::new(&store, BUSINESS);
    let resolved = resolver
        .resolve_orders(std::slice::from_ref(&order), &ResidentCache::default())
        .await?;

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].client_name, "Acme");
    assert_eq!(resolved[0].employee_name, "Mara");
    assert_eq!(resolved[0].project_name, "Webshop");
    assert_eq!(resolved[0].project.as_ref().map(|p| p.budget), Some(3_000.0));

    Ok(())
}

#[tokio::test]
async fn test_dangling_reference_degrades_to_placeholder() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;

    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;
    let order = store
        .add_order(
            BUSINESS,
            make_order("Orphan", 100.0, "deleted-client", None, &employee.id),
        )
        .await?;

    let resolver = JoinResolver::new(&store, BUSINESS);
    let resolved = resolver
        .resolve_orders(std::slice::from_ref(&order), &ResidentCache::default())
        .await?;

    // One bad reference degrades that field only; the rest of the row is
    // intact and nothing failed.
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].client_name, MISSING_LABEL);
    assert!(resolved[0].client.is_none());
    assert_eq!(resolved[0].employee_name, "Mara");

    Ok(())
}

#[tokio::test]
async fn test_cross_tenant_reference_is_treated_as_missing() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;

    let foreign_client = store
        .add_client(OTHER_BUSINESS, make_client("Foreign", 100.0))
        .await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;
    let order = store
        .add_order(
            BUSINESS,
            make_order("Leak?", 100.0, &foreign_client.id, None, &employee.id),
        )
        .await?;

    let resolver = JoinResolver::new(&store, BUSINESS);
    let resolved = resolver
        .resolve_orders(std::slice::from_ref(&order), &ResidentCache::default())
        .await?;

    // The foreign record must not surface, not even partially.
    assert_eq!(resolved[0].client_name, MISSING_LABEL);
    assert!(resolved[0].client.is_none());

    Ok(())
}

#[tokio::test]
async fn test_point_reads_are_deduplicated_per_pass() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;

    let client = store.add_client(BUSINESS, make_client("Acme", 100.0)).await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;
    let mut orders = Vec::new();
    for i in 0..4 {
        orders.push(
            store
                .add_order(
                    BUSINESS,
                    make_order(&format!("O{i}"), 10.0, &client.id, None, &employee.id),
                )
                .await?,
        );
    }

    let point_reads = Arc::new(AtomicUsize::new(0));
    let counting = CountingStore {
        inner: store.clone(),
        point_reads: point_reads.clone(),
    };
    let resolver = JoinResolver::new(&counting, BUSINESS);
    let resolved = resolver
        .resolve_orders(&orders, &ResidentCache::default())
        .await?;

    assert_eq!(resolved.len(), 4);
    // Four orders share one client and one employee: exactly two reads.
    assert_eq!(point_reads.load(Ordering::SeqCst), 2);

    Ok(())
}

#[tokio::test]
async fn test_resident_records_avoid_point_reads_entirely() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;

    let client = store.add_client(BUSINESS, make_client("Acme", 100.0)).await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;
    let order = store
        .add_order(BUSINESS, make_order("Cached", 10.0, &client.id, None, &employee.id))
        .await?;

    let mut resident = ResidentCache::default();
    resident.replace_clients(vec![client]);
    resident.replace_employees(vec![employee]);

    let point_reads = Arc::new(AtomicUsize::new(0));
    let counting = CountingStore {
        inner: store.clone(),
        point_reads: point_reads.clone(),
    };
    let resolver = JoinResolver::new(&counting, BUSINESS);
    let resolved = resolver
        .resolve_orders(std::slice::from_ref(&order), &resident)
        .await?;

    assert_eq!(resolved[0].client_name, "Acme");
    assert_eq!(point_reads.load(Ordering::SeqCst), 0);

    Ok(())
}
