//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::Duration;

use crate::metrics::{self, QueueMetrics};
use crate::notification::NotificationStatus;
use crate::server::AppState;

use super::STALE_INFLIGHT_AFTER_MINUTES;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_queue_gauges(&state).await;

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Refresh the queue gauges from the notifications table.
async fn update_queue_gauges(state: &AppState) {
    let store = state.engine.store();

    match store.counts_by_status().await {
        Ok(counts) => {
            for status in NotificationStatus::ALL {
                QueueMetrics::set_rows(status.as_str(), counts.get(status));
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to count notifications by status"),
    }

    match store
        .stale_inflight(Duration::minutes(STALE_INFLIGHT_AFTER_MINUTES))
        .await
    {
        Ok(rows) => QueueMetrics::set_stale_inflight(rows.len() as i64),
        Err(e) => tracing::warn!(error = %e, "Failed to count stale inflight notifications"),
    }
}
