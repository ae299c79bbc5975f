//! Request context extraction and authentication.
//!
//! In debug mode, the user principal is supplied via the `X-User-Id` header
//! for local development. In production mode, the principal is extracted
//! from a verified JWT bearer token (claim configurable via
//! `DRAY_JWT_USER_CLAIM`, default `sub`).
//!
//! Robot-facing endpoints do not extract a [`RequestContext`]; robots are
//! not user principals.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use ulid::Ulid;

use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::server::AppState;

/// Header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request context derived from authentication and headers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Authenticated user identifier.
    pub user_id: i64,
    /// Request ID for tracing/correlation.
    pub request_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<Self>() {
            return Ok(existing.clone());
        }

        let headers = &parts.headers;
        let request_id =
            header_string(headers, REQUEST_ID_HEADER).unwrap_or_else(|| Ulid::new().to_string());

        let user_id = if state.config.debug {
            let raw = header_string(headers, "X-User-Id").ok_or_else(|| {
                ApiError::unauthorized("missing X-User-Id header (debug mode)")
                    .with_request_id(request_id.clone())
            })?;
            raw.parse::<i64>().map_err(|_| {
                ApiError::unauthorized("X-User-Id must be an integer")
                    .with_request_id(request_id.clone())
            })?
        } else {
            extract_from_jwt(headers, &state.config.jwt, &request_id)?
        };

        let ctx = Self {
            user_id,
            request_id,
        };
        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

fn extract_from_jwt(headers: &HeaderMap, jwt: &JwtConfig, request_id: &str) -> Result<i64, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::missing_auth().with_request_id(request_id.to_string()))?;

    let (decoding_key, algorithm) = jwt_decoding_key(jwt, request_id)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_nbf = true;

    if let Some(iss) = jwt.issuer.as_deref() {
        validation.set_issuer(&[iss]);
    }
    match jwt.audience.as_deref() {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    let data = jsonwebtoken::decode::<Value>(&token, &decoding_key, &validation)
        .map_err(|_| ApiError::invalid_token().with_request_id(request_id.to_string()))?;

    let Some(claims) = data.claims.as_object() else {
        return Err(ApiError::invalid_token().with_request_id(request_id.to_string()));
    };

    match claims.get(&jwt.user_claim) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ApiError::invalid_token().with_request_id(request_id.to_string())),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map_err(|_| ApiError::invalid_token().with_request_id(request_id.to_string())),
        _ => Err(ApiError::invalid_token().with_request_id(request_id.to_string())),
    }
}

fn jwt_decoding_key(jwt: &JwtConfig, request_id: &str) -> Result<(DecodingKey, Algorithm), ApiError> {
    match (
        jwt.hs256_secret.as_deref(),
        jwt.rs256_public_key_pem.as_deref(),
    ) {
        (Some(secret), None) => Ok((DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)),
        (None, Some(pem)) => DecodingKey::from_rsa_pem(pem.as_bytes())
            .map(|key| (key, Algorithm::RS256))
            .map_err(|_| {
                ApiError::internal("configured JWT public key is not a valid RSA PEM")
                    .with_request_id(request_id.to_string())
            }),
        (Some(_), Some(_)) => Err(ApiError::internal(
            "both HS256 and RS256 JWT keys are configured; pick one",
        )
        .with_request_id(request_id.to_string())),
        (None, None) => Err(
            ApiError::internal("no JWT verification key is configured")
                .with_request_id(request_id.to_string()),
        ),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = header_string(headers, "Authorization")?;
    let token = raw.strip_prefix("Bearer ").or_else(|| raw.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
