//! # dray-store
//!
//! SQLite-backed durable store for orders and the product catalog.
//!
//! All access goes through a single [`Database`] handle wrapping
//! `tokio-rusqlite`'s background connection thread: every closure passed to
//! the connection runs serialized on that one thread, so concurrent planners
//! can never interleave between reading the shipping backlog and reserving
//! it. Do **not** create additional connections for writes.
//!
//! Query functions live in [`queries`] and accept either the async
//! [`Database`] handle or, for transaction-scoped work, a plain
//! `rusqlite::Connection` reference (which a `Transaction` derefs to).

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod database;
pub mod queries;
pub(crate) mod schema;

pub use database::{Database, IsolationMode};
