//! Order, product, and delivery-plan domain types.
//!
//! An order's `shipped_status` is a one-way street:
//! `shipping → delivering → delivered`. The reservation step (planner taking
//! ownership of an order) is the `shipping → delivering` transition; a robot
//! reporting drop-off is `delivering → delivered`. Backward transitions are
//! rejected everywhere.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippedStatus {
    /// Awaiting a robot; eligible for planning.
    Shipping,
    /// Reserved by exactly one robot's plan, not yet dropped off.
    Delivering,
    /// Terminal: dropped off.
    Delivered,
}

impl ShippedStatus {
    /// Returns the canonical lowercase wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
        }
    }

    /// Returns the only status this status may be reached from, if any.
    ///
    /// `shipping` is the initial status and has no predecessor.
    #[must_use]
    pub const fn predecessor(self) -> Option<Self> {
        match self {
            Self::Shipping => None,
            Self::Delivering => Some(Self::Shipping),
            Self::Delivered => Some(Self::Delivering),
        }
    }

    /// Returns true when transitioning from `self` to `next` follows the
    /// monotonic status machine.
    #[must_use]
    pub fn allows_transition_to(self, next: Self) -> bool {
        next.predecessor() == Some(self)
    }
}

impl fmt::Display for ShippedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShippedStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shipping" => Ok(Self::Shipping),
            "delivering" => Ok(Self::Delivering),
            "delivered" => Ok(Self::Delivered),
            other => Err(Error::invalid_argument(format!(
                "invalid order status: {other} (expected shipping, delivering, or delivered)"
            ))),
        }
    }
}

/// A durable order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Server-assigned monotonic identifier.
    pub order_id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Product this order ships.
    pub product_id: i64,
    /// Lifecycle status.
    pub shipped_status: ShippedStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Drop-off timestamp; set when the order reaches `delivered`.
    pub arrived_at: Option<DateTime<Utc>>,
    /// Product name, populated by history queries that join the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier.
    pub product_id: i64,
    /// Display name.
    pub name: String,
    /// Currency-neutral score inherited by orders.
    pub value: u32,
    /// Weight in grams.
    pub weight: u32,
    /// Image reference.
    pub image: String,
    /// Free-form description.
    pub description: String,
}

/// A planning candidate: the slice of an order the solver needs.
///
/// Weight and value are read through the product join at planning time and
/// are stable for the duration of the planning transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippableOrder {
    /// Order identifier.
    pub order_id: i64,
    /// Weight in grams.
    pub weight: u32,
    /// Value score.
    pub value: u32,
}

/// A feasible, value-maximal subset of the shipping backlog assigned to one
/// robot.
///
/// Invariants: `total_weight` never exceeds the requested capacity,
/// `total_value` is the sum of the orders' values, and each reserved order
/// appears exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPlan {
    /// The robot this plan was generated for.
    pub robot_id: String,
    /// Total weight of the selected orders, grams.
    pub total_weight: u64,
    /// Total value of the selected orders.
    pub total_value: u64,
    /// The selected orders, in candidate order (value desc, order id asc).
    pub orders: Vec<ShippableOrder>,
}

impl DeliveryPlan {
    /// Creates an empty plan for a robot with nothing to carry.
    #[must_use]
    pub fn empty(robot_id: impl Into<String>) -> Self {
        Self {
            robot_id: robot_id.into(),
            total_weight: 0,
            total_value: 0,
            orders: Vec::new(),
        }
    }

    /// Returns the ids of the reserved orders, in plan order.
    #[must_use]
    pub fn order_ids(&self) -> Vec<i64> {
        self.orders.iter().map(|order| order.order_id).collect()
    }
}
