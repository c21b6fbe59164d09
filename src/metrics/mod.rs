//! Prometheus metrics for the notification engine.
//!
//! This module provides metrics for monitoring the engine:
//! - Dispatch metrics (created by mode, skipped by reason)
//! - Send metrics (claims, deliveries, failures by stage, delivery latency)
//! - Reminder job metrics (runs, deduplicated rows)
//! - Queue gauges (rows by status, stale inflight rows)

mod helpers;

pub use helpers::{encode_metrics, NotificationMetrics, QueueMetrics, ReminderMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "backoffice_notify";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Notifications inserted, by delivery mode
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Total notifications created",
        &["mode"]
    ).unwrap();

    /// Dispatches that intentionally created nothing, by reason
    pub static ref NOTIFICATIONS_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_skipped_total", METRIC_PREFIX),
        "Total dispatches skipped without creating a notification",
        &["reason"]
    ).unwrap();

    // ============================================================================
    // Send Metrics
    // ============================================================================

    /// Rows moved from pending to inflight
    pub static ref NOTIFICATIONS_CLAIMED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_claimed_total", METRIC_PREFIX),
        "Total notifications claimed for sending"
    ).unwrap();

    /// Rows that reached `sent`
    pub static ref NOTIFICATIONS_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_delivered_total", METRIC_PREFIX),
        "Total notifications delivered"
    ).unwrap();

    /// Rows that reached `error`, by stage (render, smtp, panic)
    pub static ref NOTIFICATIONS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_failed_total", METRIC_PREFIX),
        "Total notifications that ended in error",
        &["stage"]
    ).unwrap();

    /// Terminal status writes that did not land
    pub static ref STATUS_WRITE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_status_write_failures_total", METRIC_PREFIX),
        "Total terminal status updates that failed"
    ).unwrap();

    /// Mailer call duration
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Mailer call latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    /// Delivery tasks currently running
    pub static ref DELIVERIES_IN_FLIGHT: IntGauge = register_int_gauge!(
        format!("{}_deliveries_in_flight", METRIC_PREFIX),
        "Number of delivery tasks currently running"
    ).unwrap();

    // ============================================================================
    // Reminder Metrics
    // ============================================================================

    /// Reminder job runs by job and outcome
    pub static ref REMINDER_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_reminder_runs_total", METRIC_PREFIX),
        "Total reminder job runs",
        &["job", "outcome"]
    ).unwrap();

    /// Reminder rows suppressed by dedupe
    pub static ref REMINDER_DEDUPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_reminder_deduplicated_total", METRIC_PREFIX),
        "Total reminder candidates skipped because a matching notification exists",
        &["job"]
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Notifications by status
    pub static ref QUEUE_ROWS: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_queue_rows", METRIC_PREFIX),
        "Number of notifications by status",
        &["status"]
    ).unwrap();

    /// Inflight rows older than the stale threshold
    pub static ref QUEUE_STALE_INFLIGHT: IntGauge = register_int_gauge!(
        format!("{}_queue_stale_inflight", METRIC_PREFIX),
        "Number of notifications stuck in inflight"
    ).unwrap();
}
