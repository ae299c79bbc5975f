//! # dray-api
//!
//! HTTP surface for the Dray fleet coordinator.
//!
//! Robot-facing endpoints (`/robot/plan`, `/robot/order-status`) are
//! unauthenticated; user-facing endpoints (`/orders`, `/orders/list`,
//! `/products/list`) require a principal, extracted from an `X-User-Id`
//! header in debug mode or from a verified JWT bearer token in production.
//!
//! The server wires together the store, the planner, and the caches as
//! explicit dependencies held in [`server::AppState`]; nothing in this crate
//! is process-global.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod openapi;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::AppState;
