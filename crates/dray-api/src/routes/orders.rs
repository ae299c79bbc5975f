//! User-facing order routes.
//!
//! ## Routes
//!
//! - `POST /orders` - Create orders from catalog items
//! - `POST /orders/list` - List the caller's order history
//!
//! History pages are memoized per user and query shape for a short TTL; a
//! hit skips the store entirely.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use dray_core::{Order, ShippedStatus};
use dray_store::queries::orders::{self, HistoryQuery, HistorySortField};
use dray_store::queries::SortOrder;

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::routes::common::{
    parse_match_kind, parse_sort_order, resolve_offset, ApiJson, DEFAULT_PAGE_SIZE,
};
use crate::server::AppState;

/// One line item in an order creation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    /// Catalog product to order.
    pub product_id: i64,
    /// How many orders to create for this product.
    pub quantity: u32,
}

/// Request to create orders.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrdersRequest {
    /// Items to order; zero-quantity items are skipped.
    pub items: Vec<OrderItemRequest>,
}

/// Response to an order creation request.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrdersResponse {
    /// Ids of the created orders, in insertion order.
    pub order_ids: Vec<i64>,
}

/// Request for a page of order history.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrdersListRequest {
    /// Product-name search term.
    #[serde(default)]
    pub search: Option<String>,
    /// Search type: `partial` (default) or `prefix`.
    #[serde(default, rename = "type")]
    pub match_type: Option<String>,
    /// Sort column: `order_id` (default), `product_name`, `created_at`,
    /// `shipped_status`, or `arrived_at`.
    #[serde(default)]
    pub sort_field: Option<String>,
    /// Sort direction: `asc` or `desc` (default).
    #[serde(default)]
    pub sort_order: Option<String>,
    /// 1-based page number; ignored when `offset` is set.
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size (default 20).
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Explicit row offset; overrides `page`.
    #[serde(default)]
    pub offset: Option<u32>,
}

impl OrdersListRequest {
    /// Digest of the user id and the full query shape, used as the history
    /// cache key.
    #[must_use]
    pub fn cache_key(&self, user_id: i64) -> String {
        let raw = format!(
            "{user_id}|{}|{}|{}|{}|{}|{}|{}",
            self.search.as_deref().unwrap_or_default(),
            self.match_type.as_deref().unwrap_or_default(),
            self.sort_field.as_deref().unwrap_or_default(),
            self.sort_order.as_deref().unwrap_or_default(),
            self.page.unwrap_or_default(),
            self.page_size.unwrap_or_default(),
            self.offset.map_or_else(String::new, |o| o.to_string()),
        );
        let digest = Sha256::digest(raw.as_bytes());
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    fn to_history_query(&self) -> HistoryQuery {
        let page_size = self.page_size.filter(|&size| size > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        HistoryQuery {
            search: self.search.clone().filter(|term| !term.is_empty()),
            match_kind: parse_match_kind(self.match_type.as_deref()),
            sort_field: parse_history_sort_field(self.sort_field.as_deref()),
            sort_order: parse_sort_order(self.sort_order.as_deref(), SortOrder::Desc),
            limit: page_size,
            offset: resolve_offset(self.offset, self.page, page_size),
        }
    }
}

fn parse_history_sort_field(raw: Option<&str>) -> HistorySortField {
    match raw {
        Some("product_name") => HistorySortField::ProductName,
        Some("created_at") => HistorySortField::CreatedAt,
        Some("shipped_status") => HistorySortField::ShippedStatus,
        Some("arrived_at") => HistorySortField::ArrivedAt,
        _ => HistorySortField::OrderId,
    }
}

/// One order in a history page.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummary {
    /// Order identifier.
    pub order_id: i64,
    /// Ordered product.
    pub product_id: i64,
    /// Product name.
    pub product_name: String,
    /// Lifecycle status.
    pub shipped_status: ShippedStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Drop-off timestamp, if delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrived_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            product_id: order.product_id,
            product_name: order.product_name.unwrap_or_default(),
            shipped_status: order.shipped_status,
            created_at: order.created_at,
            arrived_at: order.arrived_at,
        }
    }
}

/// One page of order history.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrdersListResponse {
    /// The page of orders.
    pub data: Vec<OrderSummary>,
    /// Total matches across all pages.
    pub total: u64,
}

/// Creates order routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_orders))
        .route("/orders/list", post(list_orders))
}

/// Create orders from catalog items.
///
/// POST /orders
#[utoipa::path(
    post,
    path = "/orders",
    tag = "orders",
    request_body = CreateOrdersRequest,
    responses(
        (status = 200, description = "Orders created", body = CreateOrdersResponse),
        (status = 400, description = "Invalid body or unknown product", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn create_orders(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateOrdersRequest>,
) -> Result<Json<CreateOrdersResponse>, ApiError> {
    let mut product_ids = Vec::new();
    for item in &req.items {
        for _ in 0..item.quantity {
            product_ids.push(item.product_id);
        }
    }
    if product_ids.is_empty() {
        return Ok(Json(CreateOrdersResponse {
            order_ids: Vec::new(),
        }));
    }

    let order_ids = orders::create_bulk(state.db(), ctx.user_id, product_ids).await?;
    tracing::info!(
        user_id = ctx.user_id,
        created = order_ids.len(),
        "created orders"
    );
    Ok(Json(CreateOrdersResponse { order_ids }))
}

/// List the caller's order history.
///
/// POST /orders/list
#[utoipa::path(
    post,
    path = "/orders/list",
    tag = "orders",
    request_body = OrdersListRequest,
    responses(
        (status = 200, description = "Order history page", body = OrdersListResponse),
        (status = 400, description = "Invalid body", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn list_orders(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<OrdersListRequest>,
) -> Result<Json<OrdersListResponse>, ApiError> {
    tracing::debug!(
        user_id = ctx.user_id,
        search = req.search.as_deref().unwrap_or_default(),
        "listing order history"
    );

    let key = req.cache_key(ctx.user_id);
    if let Some((orders, total)) = state.history().get(&key)? {
        return Ok(Json(to_response(orders, total)));
    }

    let (orders, total) = orders::list_orders(state.db(), ctx.user_id, req.to_history_query()).await?;
    state.history().put(key, orders.clone(), total)?;
    Ok(Json(to_response(orders, total)))
}

fn to_response(orders: Vec<Order>, total: u64) -> OrdersListResponse {
    OrdersListResponse {
        data: orders.into_iter().map(OrderSummary::from).collect(),
        total,
    }
}
