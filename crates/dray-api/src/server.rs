//! API server implementation.
//!
//! Provides health, ready, and API endpoints for the Dray fleet coordinator.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use dray_planner::{PlanCache, PlanCoordinator};
use dray_store::Database;

use crate::config::Config;
use crate::history::HistoryCache;
use crate::openapi;
use crate::routes;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
}

/// Shared application state for all request handlers.
///
/// The store, the planner (with its plan cache), and the history cache are
/// wired here as explicit dependencies; multiple states can coexist
/// in-process (tests build one per case).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    db: Database,
    coordinator: PlanCoordinator,
    history: Arc<HistoryCache>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates application state over an opened database.
    #[must_use]
    pub fn new(config: Config, db: Database) -> Self {
        let plan_cache = Arc::new(PlanCache::new(
            config.plan_cache_ttl(),
            config.plan_cache_max_entries,
        ));
        let coordinator = PlanCoordinator::new(db.clone(), plan_cache)
            .with_request_deadline(config.request_deadline());
        let history = Arc::new(HistoryCache::new(config.history_cache_ttl(), 1024));
        Self {
            config,
            db,
            coordinator,
            history,
        }
    }

    /// Returns the database handle.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Returns the plan coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &PlanCoordinator {
        &self.coordinator
    }

    /// Returns the order-history cache.
    #[must_use]
    pub fn history(&self) -> &HistoryCache {
        &self.history
    }
}

/// Assembles the full application router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/openapi.json", get(openapi::get_openapi_json))
        .merge(routes::robot::routes())
        .merge(routes::orders::routes())
        .merge(routes::products::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured port and serves requests until shutdown.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "dray-api listening");
    axum::serve(listener, router(state)).await
}

/// Liveness probe.
///
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    tag = "meta",
    responses(
        (status = 200, description = "Service is live", body = HealthResponse),
    )
)]
pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe; verifies the database answers a trivial query.
///
/// GET /ready
#[utoipa::path(
    get,
    path = "/ready",
    tag = "meta",
    responses(
        (status = 200, description = "Readiness state", body = ReadyResponse),
    )
)]
pub(crate) async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    let ready = state
        .db
        .connection()
        .call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
        .await
        .is_ok();
    Json(ReadyResponse { ready })
}
