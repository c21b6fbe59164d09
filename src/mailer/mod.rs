//! Outgoing email transport.
//!
//! The send engine talks to a single shared [`Mailer`]. Backends:
//! - [`SmtpMailer`]: delivers through an SMTP relay via `lettre`
//! - [`LogMailer`]: logs each message and reports success
//! - [`MemoryMailer`]: records messages in memory, used by tests

mod log;
mod memory;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::SmtpConfig;

pub use self::log::LogMailer;
pub use memory::MemoryMailer;
pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mailer configuration: {0}")]
    Config(String),

    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("error building message: {0}")]
    Message(String),

    #[error("SMTP send failed: {0}")]
    Transport(String),
}

/// Display name plus address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    pub name: String,
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// A rendered plain-text email ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: EmailAddress,
    pub to: EmailAddress,
    pub subject: String,
    pub text: String,
}

/// Email transport shared by every delivery task.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;

    /// Backend name for logs and health output.
    fn backend_name(&self) -> &str;
}

/// Create a mailer based on configuration.
///
/// - `"smtp"` (default): [`SmtpMailer`] against `host:port`
/// - `"log"`: [`LogMailer`], nothing leaves the process
///
/// Unknown backends fall back to `log` with a warning.
pub fn create_mailer(config: &SmtpConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.backend.as_str() {
        "smtp" => {
            tracing::info!(
                backend = "smtp",
                host = %config.host,
                port = config.port,
                tls = config.tls,
                "Creating SMTP mailer"
            );
            Ok(Arc::new(SmtpMailer::from_config(config)?))
        }
        "log" => {
            tracing::info!(backend = "log", "Creating log mailer");
            Ok(Arc::new(LogMailer))
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown mailer backend requested, falling back to log"
            );
            Ok(Arc::new(LogMailer))
        }
    }
}
