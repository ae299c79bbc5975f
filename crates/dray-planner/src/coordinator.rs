//! Plan coordinator: cache lookup, validation, transactional replan.
//!
//! Per request the coordinator walks a small state machine:
//!
//! | State | Transition | Next |
//! |-------|------------|------|
//! | START | cache hit + valid | RETURN_CACHED |
//! | START | cache miss or invalid | PLAN |
//! | PLAN | list, solve, reserve, commit all succeed | CACHE_AND_RETURN |
//! | PLAN | any step fails | ABORT (rollback, error surfaced) |
//! | PLAN | deadline exceeded | CANCELLED (rollback, cancellation error) |
//!
//! The coordinator is stateless across requests; the plan cache and the
//! order store arrive as constructor arguments.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use dray_core::{DeliveryPlan, Error, Result, ShippedStatus};
use dray_store::queries::orders;
use dray_store::Database;

use crate::cache::{PlanCache, PlanKey};
use crate::metrics::PlannerMetrics;
use crate::solver;

/// Default per-request planning deadline.
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(5);

/// Orchestrates delivery-plan generation and order status transitions.
#[derive(Debug, Clone)]
pub struct PlanCoordinator {
    store: Database,
    cache: Arc<PlanCache>,
    request_deadline: Duration,
    metrics: PlannerMetrics,
}

impl PlanCoordinator {
    /// Creates a coordinator over the given store and cache.
    #[must_use]
    pub fn new(store: Database, cache: Arc<PlanCache>) -> Self {
        Self {
            store,
            cache,
            request_deadline: DEFAULT_REQUEST_DEADLINE,
            metrics: PlannerMetrics::new(),
        }
    }

    /// Overrides the default per-request deadline.
    #[must_use]
    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    /// Generates (or serves from cache) a delivery plan for one robot.
    ///
    /// A cached plan is only served after every order it reserved is
    /// confirmed still `delivering`; anything else evicts the entry and
    /// forces a re-plan. A fresh plan reserves its orders
    /// (`shipping → delivering`) inside one planning transaction and is
    /// cached only after commit.
    ///
    /// `deadline` bounds the whole orchestration; when `None`, the
    /// configured default applies.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for an empty robot id
    /// - [`Error::Conflict`] when another planner reserved a selected order
    ///   first (transient; the caller may retry)
    /// - [`Error::Cancelled`] when the deadline elapses; the transaction is
    ///   rolled back and nothing is cached
    /// - [`Error::Storage`] / [`Error::Internal`] on store failures or
    ///   invariant violations
    pub async fn generate_plan(
        &self,
        robot_id: &str,
        capacity: u32,
        deadline: Option<Duration>,
    ) -> Result<DeliveryPlan> {
        if robot_id.is_empty() {
            return Err(Error::invalid_argument("robot_id must not be empty"));
        }

        let started = Instant::now();
        let key = PlanKey {
            robot_id: robot_id.to_string(),
            capacity,
        };

        if let Some(plan) = self.validated_cache_hit(&key).await? {
            self.metrics.record_plan("cached", started.elapsed());
            return Ok(plan);
        }
        self.metrics.record_cache_event("miss");

        let result = self
            .replan(&key, deadline.unwrap_or(self.request_deadline))
            .await;
        let outcome = match &result {
            Ok(_) => "planned",
            Err(Error::Conflict { .. }) => "conflict",
            Err(Error::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        self.metrics.record_plan(outcome, started.elapsed());
        result
    }

    /// Applies a robot-reported status transition to one order.
    ///
    /// Only forward transitions are accepted (`shipping → delivering →
    /// delivered`). Cache entries are deliberately not invalidated here:
    /// validation on the next cache read observes the new status and evicts.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for `shipping` targets or transitions
    ///   the order's current status does not allow
    /// - [`Error::NotFound`] for unknown order ids
    /// - [`Error::Storage`] on store failures
    pub async fn update_order_status(
        &self,
        order_id: i64,
        new_status: ShippedStatus,
    ) -> Result<()> {
        orders::transition_status(&self.store, order_id, new_status).await?;
        tracing::info!(order_id, status = %new_status, "order status updated");
        Ok(())
    }

    /// Returns a validated cached plan, evicting stale hits.
    async fn validated_cache_hit(&self, key: &PlanKey) -> Result<Option<DeliveryPlan>> {
        let Some(hit) = self.cache.get(key)? else {
            return Ok(None);
        };

        // An empty plan reserved nothing; there is nothing to re-confirm.
        if hit.order_ids.is_empty() {
            self.metrics.record_cache_event("hit");
            return Ok(Some(hit.plan));
        }

        let statuses = orders::statuses_by_ids(&self.store, hit.order_ids.clone()).await?;
        let still_reserved = statuses.len() == hit.order_ids.len()
            && statuses
                .iter()
                .all(|(_, status)| *status == ShippedStatus::Delivering);

        if still_reserved {
            self.metrics.record_cache_event("hit");
            return Ok(Some(hit.plan));
        }

        tracing::debug!(
            robot_id = %key.robot_id,
            capacity = key.capacity,
            "cached plan no longer matches live order state; evicting"
        );
        self.cache.remove(key)?;
        self.metrics.record_cache_event("invalidated");
        Ok(None)
    }

    /// Runs one planning transaction and caches the committed result.
    async fn replan(&self, key: &PlanKey, deadline: Duration) -> Result<DeliveryPlan> {
        let cancel = CancellationToken::new();
        let solver_cancel = cancel.clone();
        let capacity = key.capacity;

        let tx_future = self.store.plan_transaction(move |tx| {
            let candidates = orders::list_shipping(tx)?;
            let backlog = candidates.len();
            let selection = solver::solve(&candidates, capacity, &solver_cancel)?;
            if !selection.orders.is_empty() {
                let ids: Vec<i64> = selection.orders.iter().map(|o| o.order_id).collect();
                let updated = orders::mark_delivering(tx, &ids)?;
                if updated != ids.len() {
                    return Err(Error::conflict(format!(
                        "{} of {} selected orders were no longer shippable",
                        ids.len() - updated,
                        ids.len()
                    )));
                }
            }
            Ok((backlog, selection))
        });
        tokio::pin!(tx_future);

        let timeout = tokio::time::sleep(deadline);
        tokio::pin!(timeout);

        let raced = tokio::select! {
            result = &mut tx_future => Some(result),
            () = &mut timeout => None,
        };
        let (backlog, selection) = match raced {
            Some(result) => result,
            None => {
                // Trip the solver, then wait for the transaction to unwind;
                // the rollback has completed by the time this resolves.
                cancel.cancel();
                tx_future.await
            }
        }?;
        self.metrics.set_backlog(backlog);

        let plan = DeliveryPlan {
            robot_id: key.robot_id.clone(),
            total_weight: selection.total_weight,
            total_value: selection.total_value,
            orders: selection.orders,
        };
        if plan.total_weight > u64::from(capacity) {
            tracing::error!(
                robot_id = %key.robot_id,
                capacity,
                total_weight = plan.total_weight,
                "solver produced an infeasible selection"
            );
            return Err(Error::internal("solver produced an infeasible selection"));
        }

        let order_ids = plan.order_ids();
        tracing::info!(
            robot_id = %key.robot_id,
            capacity,
            reserved = order_ids.len(),
            total_value = plan.total_value,
            total_weight = plan.total_weight,
            "delivery plan committed"
        );
        self.cache.put(key.clone(), plan.clone(), order_ids)?;
        Ok(plan)
    }
}
