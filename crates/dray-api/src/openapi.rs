//! `OpenAPI` specification generation for the Dray API.

use std::sync::OnceLock;

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use utoipa::OpenApi;

use crate::error::ApiError;

/// `OpenAPI` documentation for the Dray API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dray API",
        version = "0.1.0",
        description = "Delivery-robot fleet coordination: plans, order status, history, catalog."
    ),
    paths(
        crate::server::health,
        crate::server::ready,
        crate::openapi::get_openapi_json,
        crate::routes::robot::generate_plan,
        crate::routes::robot::update_order_status,
        crate::routes::orders::create_orders,
        crate::routes::orders::list_orders,
        crate::routes::products::list_products,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::routes::common::EmptyResponse,
            crate::routes::robot::RobotPlanRequest,
            crate::routes::robot::RobotPlanResponse,
            crate::routes::robot::PlannedOrderResponse,
            crate::routes::robot::OrderStatusRequest,
            crate::routes::orders::OrderItemRequest,
            crate::routes::orders::CreateOrdersRequest,
            crate::routes::orders::CreateOrdersResponse,
            crate::routes::orders::OrdersListRequest,
            crate::routes::orders::OrdersListResponse,
            crate::routes::orders::OrderSummary,
            crate::routes::products::ProductsListRequest,
            crate::routes::products::ProductsListResponse,
            crate::routes::products::ProductSummary,
            crate::server::HealthResponse,
            crate::server::ReadyResponse,
        )
    ),
    tags(
        (name = "robot", description = "Robot-facing planning and status operations"),
        (name = "orders", description = "User order operations"),
        (name = "products", description = "Catalog operations"),
        (name = "meta", description = "Health and discovery endpoints"),
    ),
)]
pub struct ApiDoc;

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

static OPENAPI_JSON_CACHE: OnceLock<String> = OnceLock::new();

/// Returns the generated `OpenAPI` spec serialized as pretty JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen).
pub fn openapi_json() -> Result<String, serde_json::Error> {
    if let Some(spec) = OPENAPI_JSON_CACHE.get() {
        return Ok(spec.clone());
    }

    let spec = serde_json::to_string_pretty(&openapi())?;
    let _ = OPENAPI_JSON_CACHE.set(spec.clone());
    Ok(spec)
}

/// Returns the `OpenAPI` spec as JSON.
///
/// GET /openapi.json
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "meta",
    responses(
        (
            status = 200,
            description = "OpenAPI specification",
            body = String,
            content_type = "application/json"
        ),
    )
)]
pub async fn get_openapi_json() -> Response {
    match openapi_json() {
        Ok(spec) => (StatusCode::OK, [(CONTENT_TYPE, "application/json")], spec).into_response(),
        Err(err) => {
            ApiError::internal(format!("failed to serialize OpenAPI spec: {err}")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_core_paths() {
        let spec: serde_json::Value =
            serde_json::from_str(&openapi_json().expect("spec serializes")).expect("valid json");
        let paths = spec
            .get("paths")
            .and_then(serde_json::Value::as_object)
            .expect("paths object");
        assert!(paths.contains_key("/robot/plan"));
        assert!(paths.contains_key("/robot/order-status"));
        assert!(paths.contains_key("/orders"));
        assert!(paths.contains_key("/orders/list"));
        assert!(paths.contains_key("/products/list"));
    }
}
