//! SMTP delivery via `lettre` with TLS support.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{EmailAddress, MailError, Mailer, OutgoingEmail};
use crate::config::SmtpConfig;

/// Sends email through an SMTP relay.
#[derive(Debug)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the transport. Nothing connects until the first send.
    ///
    /// Port 465 uses implicit TLS; other ports use STARTTLS when `tls` is set
    /// and plain SMTP otherwise.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        let mut builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::Config(e.to_string()))?
                .port(config.port)
        } else if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::Config(e.to_string()))?
                .port(config.port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let transport = builder
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .build();

        Ok(Self { transport })
    }
}

fn mailbox(address: &EmailAddress) -> Result<Mailbox, MailError> {
    let parsed: Address = address.address.parse().map_err(|e: lettre::address::AddressError| {
        MailError::Address {
            address: address.address.clone(),
            reason: e.to_string(),
        }
    })?;
    let name = address.name.trim();
    Ok(Mailbox::new(
        (!name.is_empty()).then(|| name.to_string()),
        parsed,
    ))
}

/// Build the `lettre` message for a plain-text email.
pub(crate) fn build_message(email: &OutgoingEmail) -> Result<Message, MailError> {
    Message::builder()
        .from(mailbox(&email.from)?)
        .to(mailbox(&email.to)?)
        .subject(&email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.text.clone())
        .map_err(|e| MailError::Message(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::debug!(
            to = %email.to.address,
            subject = %email.subject,
            "Email handed to SMTP relay"
        );

        Ok(())
    }

    fn backend_name(&self) -> &str {
        "smtp"
    }
}
