//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERIES_IN_FLIGHT, DELIVERY_LATENCY, NOTIFICATIONS_CLAIMED_TOTAL,
    NOTIFICATIONS_CREATED_TOTAL, NOTIFICATIONS_DELIVERED_TOTAL, NOTIFICATIONS_FAILED_TOTAL,
    NOTIFICATIONS_SKIPPED_TOTAL, QUEUE_ROWS, QUEUE_STALE_INFLIGHT, REMINDER_DEDUPED_TOTAL,
    REMINDER_RUNS_TOTAL, STATUS_WRITE_FAILURES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch and send metrics
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record a created notification (`deferred` or `immediate`)
    pub fn record_created(mode: &str) {
        NOTIFICATIONS_CREATED_TOTAL.with_label_values(&[mode]).inc();
    }

    /// Record a dispatch that created nothing
    pub fn record_skipped(reason: &str) {
        NOTIFICATIONS_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_claimed() {
        NOTIFICATIONS_CLAIMED_TOTAL.inc();
    }

    pub fn record_delivered(latency_secs: f64) {
        NOTIFICATIONS_DELIVERED_TOTAL.inc();
        DELIVERY_LATENCY.observe(latency_secs);
    }

    /// Record a row closed as `error` (`render`, `smtp`, `panic`)
    pub fn record_failed(stage: &str) {
        NOTIFICATIONS_FAILED_TOTAL.with_label_values(&[stage]).inc();
    }

    pub fn record_status_write_failure() {
        STATUS_WRITE_FAILURES_TOTAL.inc();
    }

    pub fn delivery_started() {
        DELIVERIES_IN_FLIGHT.inc();
    }

    pub fn delivery_finished() {
        DELIVERIES_IN_FLIGHT.dec();
    }
}

/// Helper struct for recording reminder job metrics
pub struct ReminderMetrics;

impl ReminderMetrics {
    pub fn record_run(job: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        REMINDER_RUNS_TOTAL.with_label_values(&[job, outcome]).inc();
    }

    pub fn record_deduplicated(job: &str) {
        REMINDER_DEDUPED_TOTAL.with_label_values(&[job]).inc();
    }
}

/// Helper struct for queue gauges
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn set_rows(status: &str, count: i64) {
        QUEUE_ROWS.with_label_values(&[status]).set(count);
    }

    pub fn set_stale_inflight(count: i64) {
        QUEUE_STALE_INFLIGHT.set(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_metrics() {
        NotificationMetrics::record_created("deferred");
        ReminderMetrics::record_run("timesheet_approval", true);
        QueueMetrics::set_rows("pending", 3);

        let output = encode_metrics().unwrap();
        assert!(output.contains("backoffice_notify_notifications_created_total"));
        assert!(output.contains("backoffice_notify_reminder_runs_total"));
        assert!(output.contains("backoffice_notify_queue_rows"));
    }
}
