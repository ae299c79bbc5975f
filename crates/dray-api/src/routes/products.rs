//! Product catalog routes.
//!
//! ## Routes
//!
//! - `POST /products/list` - List the catalog with search, sorting, and
//!   offset or keyset pagination

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use dray_core::Product;
use dray_store::queries::products::{self, ProductQuery, ProductSortField};
use dray_store::queries::SortOrder;

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::routes::common::{
    parse_match_kind, parse_sort_order, resolve_offset, ApiJson, DEFAULT_PAGE_SIZE,
};
use crate::server::AppState;

/// Request for a catalog page.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductsListRequest {
    /// Name/description search term.
    #[serde(default)]
    pub search: Option<String>,
    /// Search type: `partial` (default) or `prefix`.
    #[serde(default, rename = "type")]
    pub match_type: Option<String>,
    /// Sort column: `product_id` (default), `name`, `value`, or `weight`.
    #[serde(default)]
    pub sort_field: Option<String>,
    /// Sort direction: `asc` (default) or `desc`.
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
    /// Keyset cursor: last seen product id.
    #[serde(default)]
    pub after_id: Option<i64>,
    /// Keyset cursor: last seen value (value sort only).
    #[serde(default)]
    pub after_value: Option<u32>,
    /// Keyset cursor: last seen weight (weight sort only).
    #[serde(default)]
    pub after_weight: Option<u32>,
}

impl ProductsListRequest {
    fn to_product_query(&self) -> ProductQuery {
        let page_size = self.page_size.filter(|&size| size > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        ProductQuery {
            search: self.search.clone().filter(|term| !term.is_empty()),
            match_kind: parse_match_kind(self.match_type.as_deref()),
            sort_field: parse_product_sort_field(self.sort_field.as_deref()),
            sort_order: parse_sort_order(self.sort_order.as_deref(), SortOrder::Asc),
            limit: page_size,
            offset: resolve_offset(self.offset, self.page, page_size),
            after_id: self.after_id,
            after_value: self.after_value,
            after_weight: self.after_weight,
        }
    }
}

fn parse_product_sort_field(raw: Option<&str>) -> ProductSortField {
    match raw {
        Some("name") => ProductSortField::Name,
        Some("value") => ProductSortField::Value,
        Some("weight") => ProductSortField::Weight,
        _ => ProductSortField::ProductId,
    }
}

/// One catalog product.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductSummary {
    /// Catalog identifier.
    pub product_id: i64,
    /// Display name.
    pub name: String,
    /// Value score.
    pub value: u32,
    /// Weight in grams.
    pub weight: u32,
    /// Image reference.
    pub image: String,
    /// Free-form description.
    pub description: String,
}

impl From<Product> for ProductSummary {
    fn from(product: Product) -> Self {
        Self {
            product_id: product.product_id,
            name: product.name,
            value: product.value,
            weight: product.weight,
            image: product.image,
            description: product.description,
        }
    }
}

/// One page of the catalog.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductsListResponse {
    /// The page of products.
    pub data: Vec<ProductSummary>,
    /// Total search matches across all pages (cursors never affect this).
    pub total: u64,
}

/// Creates product routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/products/list", post(list_products))
}

/// List the product catalog.
///
/// POST /products/list
#[utoipa::path(
    post,
    path = "/products/list",
    tag = "products",
    request_body = ProductsListRequest,
    responses(
        (status = 200, description = "Catalog page", body = ProductsListResponse),
        (status = 400, description = "Invalid body", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 500, description = "Internal error", body = ApiErrorBody),
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub(crate) async fn list_products(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ProductsListRequest>,
) -> Result<Json<ProductsListResponse>, ApiError> {
    tracing::debug!(
        user_id = ctx.user_id,
        search = req.search.as_deref().unwrap_or_default(),
        "listing products"
    );

    let (products, total) = products::list_products(state.db(), req.to_product_query()).await?;
    Ok(Json(ProductsListResponse {
        data: products.into_iter().map(ProductSummary::from).collect(),
        total,
    }))
}
