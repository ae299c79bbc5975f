//! Integration tests for order and catalog queries over in-memory SQLite.

use anyhow::Result;

use dray_core::{Error, Product, ShippedStatus};
use dray_store::queries::orders::{self, HistoryQuery, HistorySortField};
use dray_store::queries::products::{self, ProductQuery, ProductSortField};
use dray_store::queries::{MatchKind, SortOrder};
use dray_store::Database;

fn product(product_id: i64, name: &str, value: u32, weight: u32) -> Product {
    Product {
        product_id,
        name: name.to_string(),
        value,
        weight,
        image: String::new(),
        description: format!("{name} description"),
    }
}

async fn seeded_db() -> Result<Database> {
    let db = Database::open_in_memory().await?;
    products::insert_products(
        &db,
        vec![
            product(1, "anvil", 40, 300),
            product(2, "bellows", 50, 40),
            product(3, "crate", 60, 500),
            product(4, "crowbar", 60, 120),
            product(5, "dolly", 10, 800),
        ],
    )
    .await?;
    Ok(db)
}

#[tokio::test]
async fn create_bulk_returns_ids_in_insertion_order() -> Result<()> {
    let db = seeded_db().await?;
    let ids = orders::create_bulk(&db, 7, vec![1, 2, 2, 3]).await?;

    assert_eq!(ids.len(), 4);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    let statuses = orders::statuses_by_ids(&db, ids.clone()).await?;
    assert_eq!(statuses.len(), 4);
    assert!(statuses
        .iter()
        .all(|(_, status)| *status == ShippedStatus::Shipping));
    Ok(())
}

#[tokio::test]
async fn create_bulk_rejects_unknown_products() -> Result<()> {
    let db = seeded_db().await?;
    let result = orders::create_bulk(&db, 7, vec![1, 999]).await;
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));

    // Nothing was inserted.
    assert!(orders::shipping_backlog(&db).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn create_bulk_with_no_products_is_a_no_op() -> Result<()> {
    let db = seeded_db().await?;
    let ids = orders::create_bulk(&db, 7, Vec::new()).await?;
    assert!(ids.is_empty());
    Ok(())
}

#[tokio::test]
async fn shipping_backlog_orders_by_value_then_id() -> Result<()> {
    let db = seeded_db().await?;
    // crate (60) and crowbar (60) tie on value; the earlier order id wins.
    let ids = orders::create_bulk(&db, 7, vec![2, 4, 3, 1]).await?;

    let backlog = orders::shipping_backlog(&db).await?;
    let backlog_ids: Vec<i64> = backlog.iter().map(|o| o.order_id).collect();
    // value 60 (crowbar, order ids[1]), value 60 (crate, ids[2]),
    // value 50 (bellows, ids[0]), value 40 (anvil, ids[3]).
    assert_eq!(backlog_ids, vec![ids[1], ids[2], ids[0], ids[3]]);

    let values: Vec<u32> = backlog.iter().map(|o| o.value).collect();
    assert_eq!(values, vec![60, 60, 50, 40]);
    Ok(())
}

#[tokio::test]
async fn mark_delivering_only_updates_shipping_rows() -> Result<()> {
    let db = seeded_db().await?;
    let ids = orders::create_bulk(&db, 7, vec![1, 2]).await?;

    // Reserve the first order out-of-band.
    orders::transition_status(&db, ids[0], ShippedStatus::Delivering).await?;

    // A bulk reservation over both ids only touches the one still shipping;
    // the caller sees the short count and can abort.
    let updated = db
        .plan_transaction({
            let ids = ids.clone();
            move |tx| orders::mark_delivering(tx, &ids)
        })
        .await?;
    assert_eq!(updated, 1);
    Ok(())
}

#[tokio::test]
async fn transition_status_walks_the_status_machine() -> Result<()> {
    let db = seeded_db().await?;
    let ids = orders::create_bulk(&db, 7, vec![1]).await?;
    let order_id = ids[0];

    orders::transition_status(&db, order_id, ShippedStatus::Delivering).await?;
    orders::transition_status(&db, order_id, ShippedStatus::Delivered).await?;

    // Terminal status: no further transitions.
    let again = orders::transition_status(&db, order_id, ShippedStatus::Delivered).await;
    assert!(matches!(again, Err(Error::InvalidArgument { .. })));

    // arrived_at was stamped on delivery.
    let (orders, _) = orders::list_orders(&db, 7, HistoryQuery {
        limit: 10,
        ..HistoryQuery::default()
    })
    .await?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].shipped_status, ShippedStatus::Delivered);
    assert!(orders[0].arrived_at.is_some());
    Ok(())
}

#[tokio::test]
async fn transition_status_distinguishes_missing_orders() -> Result<()> {
    let db = seeded_db().await?;
    let result = orders::transition_status(&db, 42, ShippedStatus::Delivering).await;
    assert!(matches!(
        result,
        Err(Error::NotFound {
            resource_type: "order",
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn history_search_and_pagination() -> Result<()> {
    let db = seeded_db().await?;
    orders::create_bulk(&db, 7, vec![1, 2, 3, 4, 5]).await?;
    orders::create_bulk(&db, 8, vec![1]).await?;

    // Partial match on "cr" hits crate and crowbar, only for user 7.
    let (matched, total) = orders::list_orders(&db, 7, HistoryQuery {
        search: Some("cr".to_string()),
        match_kind: MatchKind::Partial,
        sort_field: HistorySortField::ProductName,
        sort_order: SortOrder::Asc,
        limit: 10,
        offset: 0,
    })
    .await?;
    assert_eq!(total, 2);
    let names: Vec<_> = matched
        .iter()
        .map(|o| o.product_name.clone().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["crate", "crowbar"]);

    // Prefix match on "cr" behaves identically here, but "rate" only
    // matches as a substring.
    let (prefix_matched, prefix_total) = orders::list_orders(&db, 7, HistoryQuery {
        search: Some("rate".to_string()),
        match_kind: MatchKind::Prefix,
        limit: 10,
        ..HistoryQuery::default()
    })
    .await?;
    assert_eq!(prefix_total, 0);
    assert!(prefix_matched.is_empty());

    // Page through the full history: total stays 5 on every page.
    let (page_one, total) = orders::list_orders(&db, 7, HistoryQuery {
        sort_field: HistorySortField::OrderId,
        sort_order: SortOrder::Asc,
        limit: 2,
        offset: 0,
        ..HistoryQuery::default()
    })
    .await?;
    assert_eq!(total, 5);
    assert_eq!(page_one.len(), 2);

    let (page_three, total) = orders::list_orders(&db, 7, HistoryQuery {
        sort_field: HistorySortField::OrderId,
        sort_order: SortOrder::Asc,
        limit: 2,
        offset: 4,
        ..HistoryQuery::default()
    })
    .await?;
    assert_eq!(total, 5);
    assert_eq!(page_three.len(), 1);
    Ok(())
}

#[tokio::test]
async fn catalog_offset_pagination_and_count() -> Result<()> {
    let db = seeded_db().await?;

    let (page, total) = products::list_products(&db, ProductQuery {
        sort_field: ProductSortField::Value,
        sort_order: SortOrder::Desc,
        limit: 3,
        offset: 0,
        ..ProductQuery::default()
    })
    .await?;
    assert_eq!(total, 5);
    let ids: Vec<i64> = page.iter().map(|p| p.product_id).collect();
    // value 60 twice (ids 3 and 4, descending id order), then 50.
    assert_eq!(ids, vec![4, 3, 2]);
    Ok(())
}

#[tokio::test]
async fn catalog_keyset_pagination_matches_offset_pagination() -> Result<()> {
    let db = seeded_db().await?;

    let (first, _) = products::list_products(&db, ProductQuery {
        sort_field: ProductSortField::Value,
        sort_order: SortOrder::Desc,
        limit: 2,
        ..ProductQuery::default()
    })
    .await?;
    let last = first.last().expect("first page is non-empty");

    let (keyset_page, total) = products::list_products(&db, ProductQuery {
        sort_field: ProductSortField::Value,
        sort_order: SortOrder::Desc,
        limit: 2,
        after_id: Some(last.product_id),
        after_value: Some(last.value),
        ..ProductQuery::default()
    })
    .await?;
    let (offset_page, _) = products::list_products(&db, ProductQuery {
        sort_field: ProductSortField::Value,
        sort_order: SortOrder::Desc,
        limit: 2,
        offset: 2,
        ..ProductQuery::default()
    })
    .await?;
    assert_eq!(keyset_page, offset_page);

    // The cursor never affects the total.
    assert_eq!(total, 5);
    Ok(())
}

#[tokio::test]
async fn catalog_search_covers_name_and_description() -> Result<()> {
    let db = seeded_db().await?;

    // "description" appears in every seeded description.
    let (all, total) = products::list_products(&db, ProductQuery {
        search: Some("description".to_string()),
        match_kind: MatchKind::Partial,
        limit: 10,
        ..ProductQuery::default()
    })
    .await?;
    assert_eq!(total, 5);
    assert_eq!(all.len(), 5);

    // Prefix search only matches names/descriptions starting with the term.
    let (prefixed, prefix_total) = products::list_products(&db, ProductQuery {
        search: Some("bell".to_string()),
        match_kind: MatchKind::Prefix,
        limit: 10,
        ..ProductQuery::default()
    })
    .await?;
    assert_eq!(prefix_total, 1);
    assert_eq!(prefixed[0].name, "bellows");
    Ok(())
}

#[tokio::test]
async fn duplicate_product_ids_are_rejected() -> Result<()> {
    let db = seeded_db().await?;
    let result = products::insert_products(&db, vec![product(1, "anvil again", 1, 1)]).await;
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    Ok(())
}
