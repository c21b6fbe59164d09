//! API layer - HTTP endpoint handlers and route tables.

mod health;
mod metrics;
mod routes;

pub use health::{health, stats, STALE_INFLIGHT_AFTER_MINUTES};
pub use metrics::prometheus_metrics;
pub use routes::{public_routes, trigger_routes};
