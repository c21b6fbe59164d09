// Infrastructure
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod mailer;
pub mod metrics;
pub mod telemetry;

// Domain
pub mod engine;
pub mod events;
pub mod feature;
pub mod notification;
pub mod profile;
pub mod reminders;
pub mod template;

// Application
pub mod api;
pub mod scheduler;
pub mod server;
pub mod triggers;
