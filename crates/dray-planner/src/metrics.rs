//! Observability metrics for the delivery planner.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `dray_planner_plans_total` | Counter | `outcome` | Plan requests by outcome (`cached`, `planned`, `conflict`, `cancelled`, `error`) |
//! | `dray_planner_cache_events_total` | Counter | `event` | Plan cache events (`hit`, `miss`, `invalidated`) |
//! | `dray_planner_plan_duration_seconds` | Histogram | `outcome` | End-to-end plan request duration |
//! | `dray_planner_shipping_backlog` | Gauge | - | Candidate orders observed by the last planning transaction |
//!
//! Metrics are exposed via the `metrics` crate facade; the server binary
//! installs a Prometheus recorder.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: plan requests by outcome.
    pub const PLANS_TOTAL: &str = "dray_planner_plans_total";
    /// Counter: plan cache events.
    pub const CACHE_EVENTS_TOTAL: &str = "dray_planner_cache_events_total";
    /// Histogram: end-to-end plan request duration in seconds.
    pub const PLAN_DURATION_SECONDS: &str = "dray_planner_plan_duration_seconds";
    /// Gauge: shipping backlog observed by the last planning transaction.
    pub const SHIPPING_BACKLOG: &str = "dray_planner_shipping_backlog";
}

/// Records planner metrics through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlannerMetrics;

impl PlannerMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records a completed plan request.
    pub fn record_plan(&self, outcome: &'static str, duration: Duration) {
        counter!(names::PLANS_TOTAL, "outcome" => outcome).increment(1);
        histogram!(names::PLAN_DURATION_SECONDS, "outcome" => outcome)
            .record(duration.as_secs_f64());
    }

    /// Records a plan cache event.
    pub fn record_cache_event(&self, event: &'static str) {
        counter!(names::CACHE_EVENTS_TOTAL, "event" => event).increment(1);
    }

    /// Updates the shipping backlog gauge.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_backlog(&self, orders: usize) {
        gauge!(names::SHIPPING_BACKLOG).set(orders as f64);
    }
}
