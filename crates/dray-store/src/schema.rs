//! Embedded schema, applied idempotently on every open.

/// Authoritative schema for the order queue and product catalog.
///
/// `orders(shipped_status)` serves the planner's backlog scan;
/// `orders(user_id, order_id)` serves history queries.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS products (
    product_id  INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    value       INTEGER NOT NULL CHECK (value >= 0),
    weight      INTEGER NOT NULL CHECK (weight > 0),
    image       TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS orders (
    order_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL,
    product_id     INTEGER NOT NULL REFERENCES products (product_id),
    shipped_status TEXT NOT NULL DEFAULT 'shipping'
        CHECK (shipped_status IN ('shipping', 'delivering', 'delivered')),
    created_at     TEXT NOT NULL,
    arrived_at     TEXT
);

CREATE INDEX IF NOT EXISTS idx_orders_shipped_status ON orders (shipped_status);
CREATE INDEX IF NOT EXISTS idx_orders_user ON orders (user_id, order_id);
";

/// Creates all tables and indexes if they do not exist yet.
pub(crate) fn init(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
