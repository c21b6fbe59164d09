//! In-memory mailer that records every message.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{MailError, Mailer, OutgoingEmail};

/// Records delivered messages in memory.
///
/// Addresses registered with [`MemoryMailer::fail_for`] get a transport error;
/// addresses registered with [`MemoryMailer::panic_for`] make `send` panic.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    attempts: Mutex<Vec<OutgoingEmail>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        lock(&self.failing).insert(address.to_string());
    }

    pub fn panic_for(&self, address: &str) {
        lock(&self.panicking).insert(address.to_string());
    }

    /// Successfully delivered messages, in delivery order.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        lock(&self.sent).clone()
    }

    /// Every call to `send`, including failed ones.
    pub fn attempts(&self) -> Vec<OutgoingEmail> {
        lock(&self.attempts).clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutgoingEmail> {
        lock(&self.sent)
            .iter()
            .filter(|email| email.to.address == address)
            .cloned()
            .collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        lock(&self.attempts).push(email.clone());

        if lock(&self.panicking).contains(&email.to.address) {
            panic!("memory mailer told to panic for {}", email.to.address);
        }
        if lock(&self.failing).contains(&email.to.address) {
            return Err(MailError::Transport(format!(
                "mailbox unavailable: {}",
                email.to.address
            )));
        }

        lock(&self.sent).push(email.clone());
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::EmailAddress;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: EmailAddress::new("Back Office", "noreply@example.com"),
            to: EmailAddress::new("", to),
            subject: "s".to_string(),
            text: "t".to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_and_fails() {
        let mailer = MemoryMailer::new();
        mailer.fail_for("bad@example.com");

        mailer.send(&email("ok@example.com")).await.unwrap();
        assert!(mailer.send(&email("bad@example.com")).await.is_err());

        assert_eq!(mailer.attempts().len(), 2);
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent_to("ok@example.com").len(), 1);
        assert!(mailer.sent_to("bad@example.com").is_empty());
    }
}
