//! # dray-core
//!
//! Shared domain types for the Dray delivery-robot fleet coordinator.
//!
//! This crate defines:
//!
//! - **Orders**: the unit of work robots deliver, with a monotonic
//!   `shipping → delivering → delivered` status machine
//! - **Delivery plans**: the value-maximal feasible subset of the shipping
//!   backlog assigned to one robot
//! - **Errors**: the error kinds surfaced by every Dray component
//! - **Observability**: logging bootstrap shared by binaries and tests
//!
//! Components higher in the stack (`dray-store`, `dray-planner`, `dray-api`)
//! all speak in these types; nothing here touches the database or the
//! network.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod observability;
pub mod order;

pub use error::{Error, Result};
pub use order::{DeliveryPlan, Order, Product, ShippableOrder, ShippedStatus};
