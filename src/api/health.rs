//! Health check and queue statistics endpoints.

use axum::{extract::State, Json};
use chrono::Duration;
use serde::Serialize;

use crate::error::Result;
use crate::notification::StatusCounts;
use crate::server::AppState;

/// Rows in `inflight` longer than this are reported as stale.
pub const STALE_INFLIGHT_AFTER_MINUTES: i64 = 15;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: DatabaseHealthResponse,
    pub mailer: String,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub notifications: StatusCounts,
    pub stale_inflight: usize,
    pub deliveries_in_flight: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.db.ping().await;
    let pool = state.db.pool();

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database: DatabaseHealthResponse {
            connected,
            pool_size: pool.size(),
            idle_connections: pool.num_idle() as u32,
        },
        mailer: state.engine.mailer_backend().to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let store = state.engine.store();
    let counts = store.counts_by_status().await?;
    let stale = store
        .stale_inflight(Duration::minutes(STALE_INFLIGHT_AFTER_MINUTES))
        .await?;

    Ok(Json(StatsResponse {
        notifications: counts,
        stale_inflight: stale.len(),
        deliveries_in_flight: state.engine.sender().deliveries().in_flight(),
    }))
}
