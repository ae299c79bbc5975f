//! Product catalog queries: search, sorting, offset and keyset pagination.

use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use dray_core::{Error, Product, Result};

use crate::database::{map_call_err, Database};
use crate::queries::{MatchKind, SortOrder};

/// Whitelisted sort columns for catalog queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSortField {
    /// Sort by product id.
    #[default]
    ProductId,
    /// Sort by name.
    Name,
    /// Sort by value.
    Value,
    /// Sort by weight.
    Weight,
}

impl ProductSortField {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::ProductId => "product_id",
            Self::Name => "name",
            Self::Value => "value",
            Self::Weight => "weight",
        }
    }
}

/// Parameters for a catalog page.
///
/// When an `after_*` cursor matching the sort column is present, the page is
/// fetched by keyset comparison on `(sort column, product_id)` and `offset`
/// is ignored; otherwise plain LIMIT/OFFSET applies. The total count only
/// ever reflects the search term, never the cursor.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Name/description search term.
    pub search: Option<String>,
    /// How the search term matches.
    pub match_kind: MatchKind,
    /// Sort column.
    pub sort_field: ProductSortField,
    /// Sort direction.
    pub sort_order: SortOrder,
    /// Page size.
    pub limit: u32,
    /// Page offset (offset pagination only).
    pub offset: u32,
    /// Keyset cursor: last seen product id.
    pub after_id: Option<i64>,
    /// Keyset cursor: last seen value (with `after_id`, value sort only).
    pub after_value: Option<u32>,
    /// Keyset cursor: last seen weight (with `after_id`, weight sort only).
    pub after_weight: Option<u32>,
}

/// Lists one catalog page plus the total number of search matches.
///
/// # Errors
///
/// Returns a storage error if either query fails.
pub async fn list_products(db: &Database, query: ProductQuery) -> Result<(Vec<Product>, u64)> {
    db.connection()
        .call(move |conn| {
            let products = fetch_page(conn, &query)?;
            let total = count_matches(conn, &query)?;
            Ok((products, total))
        })
        .await
        .map_err(map_call_err)
}

fn fetch_page(conn: &Connection, query: &ProductQuery) -> rusqlite::Result<Vec<Product>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(term) = query.search.as_deref().filter(|t| !t.is_empty()) {
        clauses.push("(name LIKE ? OR description LIKE ?)".to_string());
        let pattern = query.match_kind.pattern(term);
        args.push(Box::new(pattern.clone()));
        args.push(Box::new(pattern));
    }

    let op = query.sort_order.cursor_op();
    let keyset = match (
        query.sort_field,
        query.after_id,
        query.after_value,
        query.after_weight,
    ) {
        (ProductSortField::Value, Some(id), Some(value), _) => {
            clauses.push(format!("(value, product_id) {op} (?, ?)"));
            args.push(Box::new(value));
            args.push(Box::new(id));
            true
        }
        (ProductSortField::Weight, Some(id), _, Some(weight)) => {
            clauses.push(format!("(weight, product_id) {op} (?, ?)"));
            args.push(Box::new(weight));
            args.push(Box::new(id));
            true
        }
        (ProductSortField::ProductId, Some(id), _, _) => {
            clauses.push(format!("product_id {op} ?"));
            args.push(Box::new(id));
            true
        }
        _ => false,
    };

    let mut sql = String::from(
        "SELECT product_id, name, value, weight, image, description FROM products",
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let dir = query.sort_order.as_sql();
    match query.sort_field {
        ProductSortField::ProductId => {
            sql.push_str(&format!(" ORDER BY product_id {dir}"));
        }
        field => {
            sql.push_str(&format!(
                " ORDER BY {} {dir}, product_id {dir}",
                field.as_sql()
            ));
        }
    }

    sql.push_str(" LIMIT ?");
    args.push(Box::new(query.limit));
    if !keyset {
        sql.push_str(" OFFSET ?");
        args.push(Box::new(query.offset));
    }

    let mut stmt = conn.prepare(&sql)?;
    let arg_refs: Vec<&dyn ToSql> = args.iter().map(|arg| arg.as_ref()).collect();
    let rows = stmt.query_map(&arg_refs[..], |row| {
        Ok(Product {
            product_id: row.get(0)?,
            name: row.get(1)?,
            value: row.get(2)?,
            weight: row.get(3)?,
            image: row.get(4)?,
            description: row.get(5)?,
        })
    })?;
    rows.collect()
}

fn count_matches(conn: &Connection, query: &ProductQuery) -> rusqlite::Result<u64> {
    let total: i64 = if let Some(term) = query.search.as_deref().filter(|t| !t.is_empty()) {
        let pattern = query.match_kind.pattern(term);
        conn.query_row(
            "SELECT COUNT(*) FROM products WHERE (name LIKE ?1 OR description LIKE ?2)",
            params![pattern, pattern],
            |row| row.get(0),
        )?
    } else {
        conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?
    };
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Inserts catalog rows (seeding and tests).
///
/// # Errors
///
/// Returns `InvalidArgument` on duplicate product ids, or a storage error if
/// the insert fails.
pub async fn insert_products(db: &Database, products: Vec<Product>) -> Result<()> {
    if products.is_empty() {
        return Ok(());
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO products (product_id, name, value, weight, image, description)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for product in &products {
                    stmt.execute(params![
                        product.product_id,
                        product.name,
                        product.value,
                        product.weight,
                        product.image,
                        product.description,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|err| match err {
            tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, message))
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::invalid_argument(format!(
                    "product insert violates a constraint: {}",
                    message.unwrap_or_default()
                ))
            }
            other => map_call_err(other),
        })
}
