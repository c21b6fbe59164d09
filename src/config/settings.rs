use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Shared secret expected in the X-API-Key header. Unset disables the check.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Application identity used in rendered notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Absolute base for action URLs, e.g. `https://backoffice.example.com`.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    #[serde(default = "default_sender_address")]
    pub sender_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// `smtp` to deliver, `log` to only log outgoing mail.
    #[serde(default = "default_smtp_backend")]
    pub backend: String,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_seconds: u64,
}

/// Cron schedules (standard 5-field form, UTC) for the reminder jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_po_second_approval_cron")]
    pub po_second_approval: String,
    #[serde(default = "default_timesheet_submission_cron")]
    pub timesheet_submission: String,
    #[serde(default = "default_expense_approval_cron")]
    pub expense_approval: String,
    #[serde(default = "default_timesheet_approval_cron")]
    pub timesheet_approval: String,
    /// Optional periodic drain of deferred notifications.
    pub pending_sweep: Option<String>,
    /// Seconds to wait for outstanding deliveries during shutdown.
    #[serde(default = "default_delivery_grace")]
    pub delivery_grace_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_true() -> bool {
    true
}

fn default_database_url() -> String {
    "sqlite://data/backoffice.db".to_string()
}

fn default_pool_size() -> u32 {
    8
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    600 // 10 minutes
}

fn default_busy_timeout() -> u64 {
    5
}

fn default_sender_name() -> String {
    "Back Office".to_string()
}

fn default_sender_address() -> String {
    "noreply@localhost".to_string()
}

fn default_smtp_backend() -> String {
    "smtp".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout() -> u64 {
    30
}

fn default_po_second_approval_cron() -> String {
    "0 21 * * *".to_string()
}

fn default_timesheet_submission_cron() -> String {
    "0 8 * * Tue,Wed,Thu".to_string()
}

fn default_expense_approval_cron() -> String {
    "0 9 * * Thu,Fri".to_string()
}

fn default_timesheet_approval_cron() -> String {
    "0 12 * * Tue,Wed,Thu".to_string()
}

fn default_delivery_grace() -> u64 {
    15
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "backoffice-notification-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("database.url", default_database_url())?
            .set_default("smtp.backend", default_smtp_backend())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER__PORT, DATABASE__URL, APP__BASE_URL, SMTP__HOST, API__KEY, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            busy_timeout_seconds: default_busy_timeout(),
            run_migrations: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            sender_name: default_sender_name(),
            sender_address: default_sender_address(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            backend: default_smtp_backend(),
            host: default_smtp_host(),
            port: default_smtp_port(),
            tls: true,
            username: None,
            password: None,
            timeout_seconds: default_smtp_timeout(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            po_second_approval: default_po_second_approval_cron(),
            timesheet_submission: default_timesheet_submission_cron(),
            expense_approval: default_expense_approval_cron(),
            timesheet_approval: default_timesheet_approval_cron(),
            pending_sweep: None,
            delivery_grace_seconds: default_delivery_grace(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
