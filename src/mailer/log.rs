use async_trait::async_trait;

use super::{MailError, Mailer, OutgoingEmail};

/// Logs outgoing email instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to.address,
            subject = %email.subject,
            body_len = email.text.len(),
            "Email not sent (log mailer)"
        );
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "log"
    }
}
