//! Shared route helpers.

use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use utoipa::ToSchema;

use dray_store::queries::{MatchKind, SortOrder};

use crate::error::ApiError;

/// JSON extractor that maps every rejection to a 400 with the standard
/// error body (axum's default splits syntax and data errors across 400/422).
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// Empty JSON object response (`{}`).
#[derive(Debug, Serialize, ToSchema)]
pub struct EmptyResponse {}

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Parses a search match kind; unknown values fall back to partial
/// matching.
#[must_use]
pub fn parse_match_kind(raw: Option<&str>) -> MatchKind {
    match raw {
        Some("prefix") => MatchKind::Prefix,
        _ => MatchKind::Partial,
    }
}

/// Parses a sort direction, falling back to the route's default.
#[must_use]
pub fn parse_sort_order(raw: Option<&str>, default: SortOrder) -> SortOrder {
    match raw.map(str::to_ascii_uppercase).as_deref() {
        Some("ASC") => SortOrder::Asc,
        Some("DESC") => SortOrder::Desc,
        _ => default,
    }
}

/// Resolves the effective offset from explicit and page-based pagination.
#[must_use]
pub fn resolve_offset(offset: Option<u32>, page: Option<u32>, page_size: u32) -> u32 {
    offset.unwrap_or_else(|| page.unwrap_or(1).saturating_sub(1).saturating_mul(page_size))
}
