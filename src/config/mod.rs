mod settings;

pub use settings::{
    ApiConfig, AppConfig, DatabaseConfig, OtelConfig, SchedulerConfig, ServerConfig, Settings,
    SmtpConfig,
};
