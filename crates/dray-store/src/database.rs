//! Database connection management: PRAGMA setup, schema init, transactions.
//!
//! The connection is opened with WAL journaling, foreign keys ON, and a
//! 5-second busy timeout. The schema is created idempotently on open.

use std::path::Path;
use std::str::FromStr;

use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};

use dray_core::{Error, Result};

use crate::schema;

/// Isolation strategy for planning transactions.
///
/// SQLite has no `SELECT ... FOR UPDATE`; the two strategies the service
/// supports are:
///
/// - [`Serializable`](Self::Serializable): planning transactions open with
///   `BEGIN IMMEDIATE`, taking the write lock before the backlog is read, so
///   the read-plan-reserve window is serialized against other writers.
/// - [`ConditionalUpdate`](Self::ConditionalUpdate): planning transactions
///   open deferred and rely solely on the conditional
///   `... AND shipped_status = 'shipping'` update plus an affected-row count
///   check to detect lost races.
///
/// The conditional update and count check run in both modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// `BEGIN IMMEDIATE` planning transactions.
    #[default]
    Serializable,
    /// Deferred transactions guarded by the conditional-update count check.
    ConditionalUpdate,
}

impl FromStr for IsolationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "serializable" => Ok(Self::Serializable),
            "conditional_update" => Ok(Self::ConditionalUpdate),
            other => Err(Error::invalid_argument(format!(
                "invalid isolation mode: {other} (expected serializable or conditional_update)"
            ))),
        }
    }
}

/// Handle to the single serialized SQLite connection.
///
/// Cloning is cheap; all clones share the one background thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    isolation: IsolationMode,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("isolation", &self.isolation)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Opens (creating if necessary) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be opened or the schema
    /// cannot be initialized.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path.as_ref().to_path_buf())
            .await
            .map_err(map_call_err)?;
        Self::initialize(conn).await
    }

    /// Opens an in-memory database (tests and debug runs without a db path).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the schema cannot be initialized.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(map_call_err)?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: tokio_rusqlite::Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            schema::init(conn)?;
            Ok(())
        })
        .await
        .map_err(map_call_err)?;

        Ok(Self {
            conn,
            isolation: IsolationMode::default(),
        })
    }

    /// Sets the planning-transaction isolation strategy.
    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    /// Returns the configured isolation strategy.
    #[must_use]
    pub fn isolation(&self) -> IsolationMode {
        self.isolation
    }

    /// Returns the underlying serialized connection for query modules.
    #[must_use]
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Runs `f` inside one planning transaction and commits on success.
    ///
    /// The closure runs on the connection's background thread; an error
    /// return drops the transaction, rolling it back. The transaction opens
    /// `IMMEDIATE` or `DEFERRED` according to the configured
    /// [`IsolationMode`].
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or a storage error if the transaction
    /// cannot be opened or committed.
    pub async fn plan_transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let behavior = match self.isolation {
            IsolationMode::Serializable => TransactionBehavior::Immediate,
            IsolationMode::ConditionalUpdate => TransactionBehavior::Deferred,
        };

        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(behavior)?;
                let out = f(&tx).map_err(domain_err)?;
                tx.commit()?;
                Ok(out)
            })
            .await
            .map_err(map_call_err)
    }
}

/// Wraps a domain error so it survives the trip through a `call` closure.
pub(crate) fn domain_err(err: Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(err))
}

/// Maps a `tokio-rusqlite` error back to the domain error, unwrapping
/// domain errors smuggled through [`domain_err`].
pub(crate) fn map_call_err(err: tokio_rusqlite::Error) -> Error {
    match err {
        tokio_rusqlite::Error::Rusqlite(source) => {
            Error::storage_with_source("database operation failed", source)
        }
        tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
            Ok(domain) => *domain,
            Err(other) => Error::storage(format!("database task failed: {other}")),
        },
        other => Error::storage(format!("database connection failure: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_mode_parses_known_values() {
        assert_eq!(
            "serializable".parse::<IsolationMode>().unwrap(),
            IsolationMode::Serializable
        );
        assert_eq!(
            "conditional_update".parse::<IsolationMode>().unwrap(),
            IsolationMode::ConditionalUpdate
        );
        assert!("read_committed".parse::<IsolationMode>().is_err());
    }

    #[tokio::test]
    async fn plan_transaction_rolls_back_on_error() -> Result<()> {
        let db = Database::open_in_memory().await?;

        let result: Result<()> = db
            .plan_transaction(|tx| {
                tx.execute(
                    "INSERT INTO products (product_id, name, value, weight) VALUES (1, 'box', 10, 5)",
                    [],
                )
                .map_err(|e| Error::storage_with_source("insert failed", e))?;
                Err(Error::conflict("forced abort"))
            })
            .await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        let count: i64 = db
            .connection()
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?)
            })
            .await
            .map_err(map_call_err)?;
        assert_eq!(count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn plan_transaction_commits_on_success() -> Result<()> {
        let db = Database::open_in_memory().await?;

        db.plan_transaction(|tx| {
            tx.execute(
                "INSERT INTO products (product_id, name, value, weight) VALUES (1, 'box', 10, 5)",
                [],
            )
            .map_err(|e| Error::storage_with_source("insert failed", e))?;
            Ok(())
        })
        .await?;

        let count: i64 = db
            .connection()
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?)
            })
            .await
            .map_err(map_call_err)?;
        assert_eq!(count, 1);
        Ok(())
    }
}
