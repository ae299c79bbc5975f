//! Robot-facing routes.
//!
//! ## Routes
//!
//! - `POST /robot/plan` - Generate (or serve from cache) a delivery plan
//! - `POST /robot/order-status` - Report a delivery status transition

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use dray_core::{DeliveryPlan, ShippedStatus};

use crate::error::ApiError;
use crate::routes::common::{ApiJson, EmptyResponse};
use crate::server::AppState;

/// Request for a delivery plan.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RobotPlanRequest {
    /// Opaque robot identifier; must be non-empty.
    pub robot_id: String,
    /// Weight budget in grams; must be non-negative.
    pub capacity: i64,
}

/// One reserved order within a plan.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlannedOrderResponse {
    /// Order identifier.
    pub order_id: i64,
    /// Weight in grams.
    pub weight: u32,
    /// Value score.
    pub value: u32,
}

/// A delivery plan.
#[derive(Debug, Serialize, ToSchema)]
pub struct RobotPlanResponse {
    /// The requesting robot.
    pub robot_id: String,
    /// Total weight of the reserved orders, grams.
    pub total_weight: u64,
    /// Total value of the reserved orders.
    pub total_value: u64,
    /// The reserved orders.
    pub orders: Vec<PlannedOrderResponse>,
}

impl From<DeliveryPlan> for RobotPlanResponse {
    fn from(plan: DeliveryPlan) -> Self {
        Self {
            robot_id: plan.robot_id,
            total_weight: plan.total_weight,
            total_value: plan.total_value,
            orders: plan
                .orders
                .into_iter()
                .map(|order| PlannedOrderResponse {
                    order_id: order.order_id,
                    weight: order.weight,
                    value: order.value,
                })
                .collect(),
        }
    }
}

/// Request to report an order status transition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderStatusRequest {
    /// Order identifier.
    pub order_id: i64,
    /// Target status; `delivering` or `delivered`.
    pub status: String,
}

/// Creates robot routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/robot/plan", post(generate_plan))
        .route("/robot/order-status", post(update_order_status))
}

/// Generate a delivery plan for one robot.
///
/// POST /robot/plan
#[utoipa::path(
    post,
    path = "/robot/plan",
    tag = "robot",
    request_body = RobotPlanRequest,
    responses(
        (status = 200, description = "Delivery plan", body = RobotPlanResponse),
        (status = 400, description = "Invalid body", body = ApiErrorBody),
        (status = 408, description = "Planning deadline exceeded", body = ApiErrorBody),
        (status = 409, description = "Reservation conflict (retryable)", body = ApiErrorBody),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    )
)]
pub(crate) async fn generate_plan(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RobotPlanRequest>,
) -> Result<Json<RobotPlanResponse>, ApiError> {
    let capacity = u32::try_from(req.capacity)
        .map_err(|_| ApiError::bad_request("capacity must be a non-negative integer"))?;

    tracing::info!(
        robot_id = %req.robot_id,
        capacity,
        "generating delivery plan"
    );

    let plan = state
        .coordinator()
        .generate_plan(&req.robot_id, capacity, None)
        .await?;
    Ok(Json(plan.into()))
}

/// Report a delivery status transition.
///
/// POST /robot/order-status
#[utoipa::path(
    post,
    path = "/robot/order-status",
    tag = "robot",
    request_body = OrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = EmptyResponse),
        (status = 400, description = "Invalid status or transition", body = ApiErrorBody),
        (status = 404, description = "Unknown order", body = ApiErrorBody),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    )
)]
pub(crate) async fn update_order_status(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<OrderStatusRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let status: ShippedStatus = req.status.parse().map_err(ApiError::from)?;

    tracing::info!(order_id = req.order_id, status = %status, "updating order status");

    state
        .coordinator()
        .update_order_status(req.order_id, status)
        .await?;
    Ok(Json(EmptyResponse {}))
}
