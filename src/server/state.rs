use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::database::DatabasePool;
use crate::engine::NotificationEngine;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub engine: NotificationEngine,
    pub db: DatabasePool,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, db: DatabasePool, engine: NotificationEngine) -> Self {
        Self {
            settings: Arc::new(settings),
            engine,
            db,
            start_time: Instant::now(),
        }
    }
}
