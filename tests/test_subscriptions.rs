//! Tests for the live-subscription contract: full-snapshot re-delivery,
//! suppression of irrelevant and unchanged results, and clean shutdown.

mod common;

use common::*;

#[tokio::test]
async fn test_subscription_emits_initial_snapshot_first() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let order_query = TenantQuery::new(CollectionPath::Orders, BUSINESS)?.build();

    let client = store.add_client(BUSINESS, make_client("Acme", 100.0)).await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;
    let order = store
        .add_order(BUSINESS, make_order("Design", 100.0, &client.id, None, &employee.id))
        .await?;

    let mut subscription = store.subscribe(order_query);
    let initial = subscription.next().await?.expect("initial snapshot");
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].id, order.id);

    Ok(())
}

#[tokio::test]
async fn test_subscription_redelivers_full_result_set_after_each_write() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let client = store.add_client(BUSINESS, make_client("Acme", 100.0)).await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;

    let query = TenantQuery::new(CollectionPath::Orders, BUSINESS)?.build();
    let mut subscription = store.subscribe(query);

    // 1. Initial snapshot of the empty collection
    let initial = subscription.next().await?.expect("initial snapshot");
    assert!(initial.is_empty());

    // 2. Every write re-delivers the whole result set, not a diff
    store
        .add_order(BUSINESS, make_order("First", 10.0, &client.id, None, &employee.id))
        .await?;
    let after_first = subscription.next().await?.expect("snapshot after insert");
    assert_eq!(after_first.len(), 1);

    store
        .add_order(BUSINESS, make_order("Second", 20.0, &client.id, None, &employee.id))
        .await?;
    let after_second = subscription.next().await?.expect("snapshot after second insert");
    assert_eq!(after_second.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_subscription_suppresses_deliveries_that_change_nothing() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let client = store.add_client(BUSINESS, make_client("Acme", 100.0)).await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;

    let query = TenantQuery::new(CollectionPath::Orders, BUSINESS)?.build();
    let mut subscription = store.subscribe(query);
    let initial = subscription.next().await?.expect("initial snapshot");
    assert!(initial.is_empty());

    // A write to another collection and a write to the same collection for
    // another tenant both leave this query's result set untouched; neither
    // may surface. The matching write afterwards must.
    store.add_employee(BUSINESS, make_employee("Noise")).await?;
    store
        .add_order(
            OTHER_BUSINESS,
            make_order("Foreign", 99.0, "x", None, "y"),
        )
        .await?;
    let mine = store
        .add_order(BUSINESS, make_order("Mine", 10.0, &client.id, None, &employee.id))
        .await?;

    let snapshot = subscription.next().await?.expect("snapshot after writes");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, mine.id);

    Ok(())
}

#[tokio::test]
async fn test_closed_subscription_yields_none() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let query = TenantQuery::new(CollectionPath::Orders, BUSINESS)?.build();

    let mut subscription = store.subscribe(query);
    subscription.next().await?.expect("initial snapshot");
    subscription.close();
    assert!(subscription.next().await?.is_none());

    Ok(())
}
