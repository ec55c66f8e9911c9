//! Tests for the view session: live re-derivation, snapshot coalescing,
//! subscription lifecycle and tenant isolation end to end.

mod common;

use common::*;

async fn seed_one_order(store: &DocumentStore) -> anyhow::Result<(Client, Employee)> {
    let client = store.add_client(BUSINESS, make_client("Acme", 5_000.0)).await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;
    store
        .add_order(
            BUSINESS,
            make_order("Design", 400.0, &client.id, None, &employee.id),
        )
        .await?;
    Ok((client, employee))
}

#[tokio::test]
async fn test_session_derives_rows_from_initial_snapshots() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    seed_one_order(&store).await?;

    let mut session = ViewSession::open(store.clone(), BUSINESS, ViewKind::Income)?;
    let rows = pump_until(&mut session, |rows| rows.len() == 1).await?;

    assert_eq!(rows[0].name, "Design");
    assert_eq!(rows[0].client_name, "Acme");
    assert_eq!(rows[0].employee_name, "Mara");
    assert_eq!(rows[0].amount, 400.0);

    Ok(())
}

#[tokio::test]
async fn test_session_rederives_after_each_write() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let (client, employee) = seed_one_order(&store).await?;

    let mut session = ViewSession::open(store.clone(), BUSINESS, ViewKind::Income)?;
    pump_until(&mut session, |rows| rows.len() == 1).await?;

    store
        .add_order(
            BUSINESS,
            make_order("Build", 800.0, &client.id, None, &employee.id),
        )
        .await?;
    let rows = pump_until(&mut session, |rows| rows.len() == 2).await?;
    assert!(rows.iter().any(|r| r.name == "Build" && r.amount == 800.0));

    // The watch channel carries the same rows.
    assert_eq!(*session.rows().borrow(), rows);

    Ok(())
}

#[tokio::test]
async fn test_rapid_writes_coalesce_to_the_latest_state() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let (client, employee) = seed_one_order(&store).await?;

    let mut session = ViewSession::open(store.clone(), BUSINESS, ViewKind::Income)?;
    pump_until(&mut session, |rows| rows.len() == 1).await?;

    // A burst of writes; whatever intermediate snapshots are queued, the
    // published result must converge on the final state.
    for i in 0..5 {
        store
            .add_order(
                BUSINESS,
                make_order(&format!("Burst {i}"), 10.0, &client.id, None, &employee.id),
            )
            .await?;
    }
    let rows = pump_until(&mut session, |rows| rows.len() == 6).await?;
    assert_eq!(rows.len(), 6);

    Ok(())
}

#[tokio::test]
async fn test_foreign_tenant_records_never_surface() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    seed_one_order(&store).await?;

    // Writes under another tenant, same collections.
    let foreign_client = store
        .add_client(OTHER_BUSINESS, make_client("Foreign", 100.0))
        .await?;
    let foreign_employee = store
        .add_employee(OTHER_BUSINESS, make_employee("Spy"))
        .await?;
    store
        .add_order(
            OTHER_BUSINESS,
            make_order(
                "Hidden",
                999.0,
                &foreign_client.id,
                None,
                &foreign_employee.id,
            ),
        )
        .await?;

    let mut session = ViewSession::open(store.clone(), BUSINESS, ViewKind::Income)?;
    let rows = pump_until(&mut session, |rows| rows.len() == 1).await?;
    assert_eq!(rows[0].name, "Design");
    assert!(rows.iter().all(|r| r.client_name != "Foreign"));

    Ok(())
}

#[tokio::test]
async fn test_project_page_subscription_is_replaced_not_duplicated() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let (client, _) = seed_one_order(&store).await?;
    for i in 0..15 {
        store
            .add_project(&client, make_project(&format!("P{i:02}"), 100.0))
            .await?;
    }

    let mut session = ViewSession::open(store.clone(), BUSINESS, ViewKind::Projects)?;
    assert_eq!(session.live_subscriptions(), 3);

    let first = session.show_projects_page(&client.id, 1).await?;
    assert_eq!(first.records.len(), 10);
    assert_eq!(session.live_subscriptions(), 4);

    // Same slot again: the old window subscription is replaced, not added.
    session.show_projects_page(&client.id, 2).await?;
    assert_eq!(session.live_subscriptions(), 4);

    let rows = pump_until(&mut session, |rows| !rows.is_empty()).await?;
    assert!(rows.iter().all(|r| r.client_name == "Acme"));

    Ok(())
}

#[tokio::test]
async fn test_filter_changes_recompute_without_resubscribing() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let (client, employee) = seed_one_order(&store).await?;
    store
        .add_order(
            BUSINESS,
            make_order("Maintenance", 100.0, &client.id, None, &employee.id),
        )
        .await?;

    let mut session = ViewSession::open(store.clone(), BUSINESS, ViewKind::Income)?;
    pump_until(&mut session, |rows| rows.len() == 2).await?;
    let live_before = session.live_subscriptions();

    let filtered = session
        .set_filters(ViewFilters {
            date_range: None,
            search: Some("maintenance".to_string()),
        })
        .await?;
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].name, "Maintenance");
    assert_eq!(session.live_subscriptions(), live_before);

    let unfiltered = session.set_filters(ViewFilters::default()).await?;
    assert_eq!(unfiltered.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_view_switch_reshapes_the_same_residents() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    let client = store.add_client(BUSINESS, make_client("Acme", 5_000.0)).await?;
    let employee = store.add_employee(BUSINESS, make_employee("Mara")).await?;
    let project = store
        .add_project(&client, make_project("Webshop", 1_000.0))
        .await?;
    for amount in [200.0, 300.0] {
        store
            .add_order(
                BUSINESS,
                make_order(
                    "Work",
                    amount,
                    &client.id,
                    Some(&project.id),
                    &employee.id,
                ),
            )
            .await?;
    }

    let mut session = ViewSession::open(store.clone(), BUSINESS, ViewKind::Income)?;
    pump_until(&mut session, |rows| rows.len() == 2).await?;

    let profits = session.set_view(ViewKind::Profits).await?;
    assert_eq!(profits.len(), 1);
    assert_eq!(profits[0].total_expense, Some(500.0));
    assert_eq!(profits[0].profit, Some(500.0));
    assert_eq!(profits[0].name, "Webshop");

    Ok(())
}

#[tokio::test]
async fn test_close_releases_every_subscription() -> anyhow::Result<()> {
    let (store, _dir) = create_test_store().await;
    seed_one_order(&store).await?;

    let mut session = ViewSession::open(store.clone(), BUSINESS, ViewKind::Income)?;
    pump_until(&mut session, |rows| rows.len() == 1).await?;
    assert_eq!(session.live_subscriptions(), 3);
    session.close();

    Ok(())
}
