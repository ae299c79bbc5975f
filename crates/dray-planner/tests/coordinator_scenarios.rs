//! End-to-end planner scenarios over an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use dray_core::{Error, Product, ShippedStatus};
use dray_planner::{PlanCache, PlanCoordinator, PlanKey};
use dray_store::queries::{orders, products};
use dray_store::Database;

fn product(product_id: i64, value: u32, weight: u32) -> Product {
    Product {
        product_id,
        name: format!("product-{product_id}"),
        value,
        weight,
        image: String::new(),
        description: String::new(),
    }
}

async fn setup(
    catalog: Vec<Product>,
    cache_ttl: Duration,
) -> Result<(Database, Arc<PlanCache>, PlanCoordinator)> {
    let db = Database::open_in_memory().await?;
    products::insert_products(&db, catalog).await?;
    let cache = Arc::new(PlanCache::new(cache_ttl, 100));
    let coordinator = PlanCoordinator::new(db.clone(), Arc::clone(&cache));
    Ok((db, cache, coordinator))
}

#[tokio::test]
async fn empty_backlog_yields_empty_plan_and_caches_it() -> Result<()> {
    let (_db, cache, coordinator) =
        setup(vec![product(1, 10, 5)], Duration::from_secs(10)).await?;

    let first = coordinator.generate_plan("R1", 50, None).await?;
    assert_eq!(first.robot_id, "R1");
    assert_eq!(first.total_weight, 0);
    assert_eq!(first.total_value, 0);
    assert!(first.orders.is_empty());
    assert_eq!(cache.len()?, 1);

    // Second call within TTL serves the cached copy.
    let second = coordinator.generate_plan("R1", 50, None).await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn single_fit_reserves_the_order() -> Result<()> {
    let (db, _cache, coordinator) =
        setup(vec![product(1, 100, 10)], Duration::from_secs(10)).await?;
    let order_ids = orders::create_bulk(&db, 1, vec![1]).await?;
    let order_id = order_ids[0];

    let plan = coordinator.generate_plan("R1", 10, None).await?;
    assert_eq!(plan.total_weight, 10);
    assert_eq!(plan.total_value, 100);
    assert_eq!(plan.order_ids(), vec![order_id]);

    let statuses = orders::statuses_by_ids(&db, vec![order_id]).await?;
    assert_eq!(statuses, vec![(order_id, ShippedStatus::Delivering)]);

    // Once reserved, the order never reappears in the backlog.
    assert!(orders::shipping_backlog(&db).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn classic_knapsack_choice_takes_the_feasible_pair() -> Result<()> {
    let catalog = vec![product(1, 40, 3), product(2, 50, 4), product(3, 60, 5)];
    let (db, _cache, coordinator) = setup(catalog, Duration::from_secs(10)).await?;
    let ids = orders::create_bulk(&db, 1, vec![1, 2, 3]).await?;

    let plan = coordinator.generate_plan("R1", 8, None).await?;
    assert_eq!(plan.total_value, 100);
    assert_eq!(plan.total_weight, 8);

    let mut picked = plan.order_ids();
    picked.sort_unstable();
    let mut expected = vec![ids[0], ids[2]];
    expected.sort_unstable();
    assert_eq!(picked, expected);
    Ok(())
}

#[tokio::test]
async fn concurrent_planners_never_share_an_order() -> Result<()> {
    let (db, _cache, coordinator) =
        setup(vec![product(1, 50, 5)], Duration::from_secs(10)).await?;
    let order_ids = orders::create_bulk(&db, 1, vec![1]).await?;
    let contested = order_ids[0];

    let (a, b) = tokio::join!(
        coordinator.generate_plan("A", 10, None),
        coordinator.generate_plan("B", 10, None),
    );
    let a = a?;
    let b = b?;

    let a_has = a.order_ids().contains(&contested);
    let b_has = b.order_ids().contains(&contested);
    assert!(a_has != b_has, "exactly one plan must contain the order");

    let loser = if a_has { &b } else { &a };
    assert!(loser.orders.is_empty());
    Ok(())
}

#[tokio::test]
async fn external_transition_invalidates_cached_plan() -> Result<()> {
    let (db, cache, coordinator) =
        setup(vec![product(1, 50, 5)], Duration::from_secs(10)).await?;
    let order_ids = orders::create_bulk(&db, 1, vec![1]).await?;
    let order_id = order_ids[0];

    let first = coordinator.generate_plan("R1", 10, None).await?;
    assert_eq!(first.order_ids(), vec![order_id]);

    // Out-of-band transition while the cache entry is still within TTL.
    coordinator
        .update_order_status(order_id, ShippedStatus::Delivered)
        .await?;

    let second = coordinator.generate_plan("R1", 10, None).await?;
    assert!(second.orders.is_empty(), "stale plan must not be served");

    // The re-plan replaced the entry rather than serving the stale one.
    let key = PlanKey {
        robot_id: "R1".to_string(),
        capacity: 10,
    };
    let slot = cache.get(&key)?.expect("fresh entry cached");
    assert!(slot.order_ids.is_empty());
    Ok(())
}

#[tokio::test]
async fn reservation_rollback_invalidates_cached_plan() -> Result<()> {
    let (db, _cache, coordinator) =
        setup(vec![product(1, 50, 5)], Duration::from_secs(10)).await?;
    let order_ids = orders::create_bulk(&db, 1, vec![1]).await?;
    let order_id = order_ids[0];

    let first = coordinator.generate_plan("R1", 10, None).await?;
    assert_eq!(first.order_ids(), vec![order_id]);

    // Admin tooling reverts the reservation behind the planner's back.
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE orders SET shipped_status = 'shipping' WHERE order_id = ?1",
                rusqlite::params![order_id],
            )?;
            Ok(())
        })
        .await?;

    // The cached hit fails validation (status is shipping, not delivering)
    // and the order is planned again.
    let second = coordinator.generate_plan("R1", 10, None).await?;
    assert_eq!(second.order_ids(), vec![order_id]);
    Ok(())
}

#[tokio::test]
async fn cancellation_rolls_back_and_caches_nothing() -> Result<()> {
    let (db, cache, coordinator) =
        setup(vec![product(1, 10, 10)], Duration::from_secs(10)).await?;
    orders::create_bulk(&db, 1, vec![1; 1000]).await?;

    let result = coordinator
        .generate_plan("R1", 10_000, Some(Duration::from_millis(1)))
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));

    // Rollback: every order is still shipping, and nothing was cached.
    assert_eq!(orders::shipping_backlog(&db).await?.len(), 1000);
    assert!(cache.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn cached_plans_are_defensive_copies() -> Result<()> {
    let (db, _cache, coordinator) =
        setup(vec![product(1, 50, 5)], Duration::from_secs(10)).await?;
    orders::create_bulk(&db, 1, vec![1]).await?;

    let mut first = coordinator.generate_plan("R1", 10, None).await?;
    first.orders.clear();
    first.total_value = 0;

    let second = coordinator.generate_plan("R1", 10, None).await?;
    assert_eq!(second.orders.len(), 1);
    assert_eq!(second.total_value, 50);
    Ok(())
}

#[tokio::test]
async fn empty_robot_id_is_rejected() -> Result<()> {
    let (_db, _cache, coordinator) = setup(Vec::new(), Duration::from_secs(10)).await?;
    let result = coordinator.generate_plan("", 10, None).await;
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    Ok(())
}

#[tokio::test]
async fn status_updates_enforce_the_monotonic_rule() -> Result<()> {
    let (db, _cache, coordinator) =
        setup(vec![product(1, 50, 5)], Duration::from_secs(10)).await?;
    let order_ids = orders::create_bulk(&db, 1, vec![1]).await?;
    let order_id = order_ids[0];

    // shipping → delivered skips a state.
    let skipped = coordinator
        .update_order_status(order_id, ShippedStatus::Delivered)
        .await;
    assert!(matches!(skipped, Err(Error::InvalidArgument { .. })));

    // No backward transitions.
    let backward = coordinator
        .update_order_status(order_id, ShippedStatus::Shipping)
        .await;
    assert!(matches!(backward, Err(Error::InvalidArgument { .. })));

    // Unknown ids are distinguishable from invalid transitions.
    let missing = coordinator
        .update_order_status(9999, ShippedStatus::Delivering)
        .await;
    assert!(matches!(missing, Err(Error::NotFound { .. })));

    // The happy path walks the whole chain.
    coordinator
        .update_order_status(order_id, ShippedStatus::Delivering)
        .await?;
    coordinator
        .update_order_status(order_id, ShippedStatus::Delivered)
        .await?;
    Ok(())
}
