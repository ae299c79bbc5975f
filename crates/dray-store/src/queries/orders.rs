//! Order queue queries: backlog scan, reservation, transitions, history.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use dray_core::{Error, Order, Result, ShippableOrder, ShippedStatus};

use crate::database::{domain_err, map_call_err, Database};
use crate::queries::{placeholders, MatchKind, SortOrder};

/// Returns the full shipping backlog with weight/value via the product join,
/// ordered `value DESC, order_id ASC` so the solver sees a deterministic
/// candidate sequence.
///
/// Runs on the caller's connection so it composes into a planning
/// transaction.
///
/// # Errors
///
/// Returns a storage error if the scan fails.
pub fn list_shipping(conn: &Connection) -> Result<Vec<ShippableOrder>> {
    let mut stmt = conn
        .prepare(
            "SELECT o.order_id, p.weight, p.value
             FROM orders o
             JOIN products p ON o.product_id = p.product_id
             WHERE o.shipped_status = 'shipping'
             ORDER BY p.value DESC, o.order_id ASC",
        )
        .map_err(|e| Error::storage_with_source("preparing shipping backlog scan failed", e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(ShippableOrder {
                order_id: row.get(0)?,
                weight: row.get(1)?,
                value: row.get(2)?,
            })
        })
        .map_err(|e| Error::storage_with_source("scanning shipping backlog failed", e))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::storage_with_source("reading shipping backlog row failed", e))
}

/// Conditionally reserves `order_ids`: `shipping → delivering`.
///
/// Returns the number of rows actually updated. The caller compares this
/// against the planned count; a mismatch means another planner won the race
/// for at least one order, and the transaction must abort.
///
/// # Errors
///
/// Returns a storage error if the update fails.
pub fn mark_delivering(conn: &Connection, order_ids: &[i64]) -> Result<usize> {
    if order_ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "UPDATE orders SET shipped_status = 'delivering'
         WHERE shipped_status = 'shipping' AND order_id IN ({})",
        placeholders(order_ids.len())
    );
    conn.execute(&sql, params_from_iter(order_ids.iter().copied()))
        .map_err(|e| Error::storage_with_source("reserving orders failed", e))
}

/// Async snapshot of the shipping backlog, outside any planning transaction.
///
/// # Errors
///
/// Returns a storage error if the scan fails.
pub async fn shipping_backlog(db: &Database) -> Result<Vec<ShippableOrder>> {
    db.connection()
        .call(|conn| list_shipping(conn).map_err(domain_err))
        .await
        .map_err(map_call_err)
}

/// Reads current statuses for `order_ids` (cache validation path).
///
/// Missing ids are simply absent from the result; callers detect them by
/// comparing lengths. Runs without a transaction.
///
/// # Errors
///
/// Returns a storage error if the read fails.
pub async fn statuses_by_ids(
    db: &Database,
    order_ids: Vec<i64>,
) -> Result<Vec<(i64, ShippedStatus)>> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }
    let raw: Vec<(i64, String)> = db
        .connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT order_id, shipped_status FROM orders WHERE order_id IN ({})",
                placeholders(order_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(order_ids.iter().copied()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
        .map_err(map_call_err)?;

    raw.into_iter()
        .map(|(id, status)| Ok((id, parse_status(&status)?)))
        .collect()
}

/// Bulk-creates one `shipping` order per product id for `user_id`.
///
/// Product ids are validated up front; ids are returned in insertion order.
///
/// # Errors
///
/// Returns `InvalidArgument` for unknown product ids, or a storage error if
/// the insert fails.
pub async fn create_bulk(db: &Database, user_id: i64, product_ids: Vec<i64>) -> Result<Vec<i64>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let distinct: HashSet<i64> = product_ids.iter().copied().collect();
            let count_sql = format!(
                "SELECT COUNT(*) FROM products WHERE product_id IN ({})",
                placeholders(distinct.len())
            );
            let known: i64 = tx.query_row(
                &count_sql,
                params_from_iter(distinct.iter().copied()),
                |row| row.get(0),
            )?;
            if usize::try_from(known).unwrap_or(0) != distinct.len() {
                return Err(domain_err(Error::invalid_argument(
                    "one or more product ids do not exist",
                )));
            }

            let now = Utc::now();
            let mut ids = Vec::with_capacity(product_ids.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO orders (user_id, product_id, shipped_status, created_at)
                     VALUES (?1, ?2, 'shipping', ?3)",
                )?;
                for product_id in &product_ids {
                    stmt.execute(params![user_id, product_id, now])?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(map_call_err)
}

/// Applies a single monotonic status transition to one order.
///
/// The update is conditional on the order currently holding the sole valid
/// predecessor status; reaching `delivered` stamps `arrived_at`.
///
/// # Errors
///
/// - `InvalidArgument` when `new_status` is `shipping` (no backward
///   transitions) or the order holds a status the transition is not valid
///   from
/// - `NotFound` when no such order exists
/// - a storage error if the update fails
pub async fn transition_status(
    db: &Database,
    order_id: i64,
    new_status: ShippedStatus,
) -> Result<()> {
    let Some(expected) = new_status.predecessor() else {
        return Err(Error::invalid_argument(
            "orders cannot transition back to shipping",
        ));
    };

    db.connection()
        .call(move |conn| {
            let affected = if new_status == ShippedStatus::Delivered {
                conn.execute(
                    "UPDATE orders SET shipped_status = ?1, arrived_at = ?2
                     WHERE order_id = ?3 AND shipped_status = ?4",
                    params![new_status.as_str(), Utc::now(), order_id, expected.as_str()],
                )?
            } else {
                conn.execute(
                    "UPDATE orders SET shipped_status = ?1
                     WHERE order_id = ?2 AND shipped_status = ?3",
                    params![new_status.as_str(), order_id, expected.as_str()],
                )?
            };
            if affected == 1 {
                return Ok(());
            }

            // Zero rows: either the order does not exist or it holds a
            // status the transition is not valid from.
            let current: Option<String> = conn
                .query_row(
                    "SELECT shipped_status FROM orders WHERE order_id = ?1",
                    params![order_id],
                    |row| row.get(0),
                )
                .optional()?;
            match current {
                None => Err(domain_err(Error::not_found("order", order_id))),
                Some(status) => Err(domain_err(Error::invalid_argument(format!(
                    "order {order_id} cannot transition from {status} to {new_status}"
                )))),
            }
        })
        .await
        .map_err(map_call_err)
}

/// Whitelisted sort columns for order-history queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistorySortField {
    /// Sort by order id.
    #[default]
    OrderId,
    /// Sort by the joined product name.
    ProductName,
    /// Sort by creation time.
    CreatedAt,
    /// Sort by lifecycle status.
    ShippedStatus,
    /// Sort by drop-off time.
    ArrivedAt,
}

impl HistorySortField {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::OrderId => "o.order_id",
            Self::ProductName => "p.name",
            Self::CreatedAt => "o.created_at",
            Self::ShippedStatus => "o.shipped_status",
            Self::ArrivedAt => "o.arrived_at",
        }
    }
}

/// Parameters for an order-history page.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Product-name search term.
    pub search: Option<String>,
    /// How the search term matches.
    pub match_kind: MatchKind,
    /// Sort column.
    pub sort_field: HistorySortField,
    /// Sort direction.
    pub sort_order: SortOrder,
    /// Page size.
    pub limit: u32,
    /// Page offset.
    pub offset: u32,
}

/// Lists one page of a user's order history with the total match count.
///
/// The total is fetched in the same query via `COUNT(*) OVER ()`, so data
/// and count can never disagree.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub async fn list_orders(
    db: &Database,
    user_id: i64,
    query: HistoryQuery,
) -> Result<(Vec<Order>, u64)> {
    let raw: Vec<(RawOrder, i64)> = db
        .connection()
        .call(move |conn| {
            let mut sql = String::from(
                "SELECT o.order_id, o.user_id, o.product_id, o.shipped_status,
                        o.created_at, o.arrived_at, p.name AS product_name,
                        COUNT(*) OVER () AS total_count
                 FROM orders o
                 JOIN products p ON o.product_id = p.product_id
                 WHERE o.user_id = ?",
            );
            let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(user_id)];

            if let Some(term) = query.search.as_deref().filter(|t| !t.is_empty()) {
                sql.push_str(" AND p.name LIKE ?");
                args.push(Box::new(query.match_kind.pattern(term)));
            }

            sql.push_str(&format!(
                " ORDER BY {} {}, o.order_id ASC LIMIT ? OFFSET ?",
                query.sort_field.as_sql(),
                query.sort_order.as_sql()
            ));
            args.push(Box::new(query.limit));
            args.push(Box::new(query.offset));

            let mut stmt = conn.prepare(&sql)?;
            let arg_refs: Vec<&dyn ToSql> = args.iter().map(|arg| arg.as_ref()).collect();
            let rows = stmt.query_map(&arg_refs[..], |row| {
                Ok((
                    RawOrder {
                        order_id: row.get(0)?,
                        user_id: row.get(1)?,
                        product_id: row.get(2)?,
                        shipped_status: row.get(3)?,
                        created_at: row.get(4)?,
                        arrived_at: row.get(5)?,
                        product_name: row.get(6)?,
                    },
                    row.get(7)?,
                ))
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
        .map_err(map_call_err)?;

    let total = raw
        .first()
        .map_or(0, |(_, count)| u64::try_from(*count).unwrap_or(0));
    let orders = raw
        .into_iter()
        .map(|(row, _)| row.into_order())
        .collect::<Result<Vec<_>>>()?;
    Ok((orders, total))
}

struct RawOrder {
    order_id: i64,
    user_id: i64,
    product_id: i64,
    shipped_status: String,
    created_at: chrono::DateTime<Utc>,
    arrived_at: Option<chrono::DateTime<Utc>>,
    product_name: String,
}

impl RawOrder {
    fn into_order(self) -> Result<Order> {
        Ok(Order {
            order_id: self.order_id,
            user_id: self.user_id,
            product_id: self.product_id,
            shipped_status: parse_status(&self.shipped_status)?,
            created_at: self.created_at,
            arrived_at: self.arrived_at,
            product_name: Some(self.product_name),
        })
    }
}

/// Parses a status column; the schema CHECK constraint makes failure an
/// invariant violation rather than bad input.
fn parse_status(raw: &str) -> Result<ShippedStatus> {
    raw.parse()
        .map_err(|_| Error::internal(format!("order row holds invalid status: {raw}")))
}
