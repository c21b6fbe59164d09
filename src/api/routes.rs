use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;
use crate::triggers::{
    dispatch_notification, drain_notifications, expense_rejected, run_reminder,
    send_notification, timesheet_rejected, timesheet_shared,
};

use super::{health, prometheus_metrics, stats};

/// Unauthenticated monitoring endpoints.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
}

/// Engine operations, mounted under `/api/v1` behind the API key.
pub fn trigger_routes() -> Router<AppState> {
    Router::new()
        // Queue
        .route("/notifications/dispatch", post(dispatch_notification))
        .route("/notifications/drain", post(drain_notifications))
        .route("/notifications/{id}/send", post(send_notification))
        // Reminder jobs
        .route("/reminders/{job}", post(run_reminder))
        // Business events
        .route("/events/timesheet-rejected", post(timesheet_rejected))
        .route("/events/expense-rejected", post(expense_rejected))
        .route("/events/timesheet-shared", post(timesheet_shared))
}
