use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::NotifyError;

/// Template variables carried by a notification.
pub type NotificationData = Map<String, Value>;

/// Lifecycle state of a notification row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    /// Queued, waiting for the send engine
    Pending,
    /// Claimed by the send engine, delivery in progress
    Inflight,
    /// Delivered (terminal)
    Sent,
    /// Failed (terminal), `error` holds the reason
    Error,
}

impl NotificationStatus {
    pub const ALL: [NotificationStatus; 4] = [
        NotificationStatus::Pending,
        NotificationStatus::Inflight,
        NotificationStatus::Sent,
        NotificationStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Inflight => "inflight",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Error)
    }

    /// Legal edges: `pending → inflight → {sent, error}`.
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        matches!(
            (self, next),
            (NotificationStatus::Pending, NotificationStatus::Inflight)
                | (NotificationStatus::Inflight, NotificationStatus::Sent)
                | (NotificationStatus::Inflight, NotificationStatus::Error)
        )
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "inflight" => Ok(NotificationStatus::Inflight),
            "sent" => Ok(NotificationStatus::Sent),
            "error" => Ok(NotificationStatus::Error),
            other => Err(format!("unknown notification status {:?}", other)),
        }
    }
}

/// How dispatch delivers a new notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Queue only; a later drain sends it
    Deferred,
    /// Queue, then send this notification now
    Immediate,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Deferred => "deferred",
            DeliveryMode::Immediate => "immediate",
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deferred" => Ok(DeliveryMode::Deferred),
            "immediate" => Ok(DeliveryMode::Immediate),
            other => Err(NotifyError::InvalidMode(other.to_string())),
        }
    }
}

/// Arguments to [`NotificationDispatcher::dispatch`](super::NotificationDispatcher::dispatch)
#[derive(Debug, Clone)]
pub struct DispatchArgs {
    pub template_code: String,
    pub recipient_uid: String,
    pub data: NotificationData,
    /// True for scheduler and event originated notifications
    pub system: bool,
    /// User whose action produced the notification; empty for none
    pub actor_uid: String,
    pub mode: DeliveryMode,
}

impl DispatchArgs {
    pub fn new(
        template_code: impl Into<String>,
        recipient_uid: impl Into<String>,
        mode: DeliveryMode,
    ) -> Self {
        Self {
            template_code: template_code.into(),
            recipient_uid: recipient_uid.into(),
            data: NotificationData::new(),
            system: false,
            actor_uid: String::new(),
            mode,
        }
    }

    pub fn data(mut self, data: NotificationData) -> Self {
        self.data = data;
        self
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    pub fn actor(mut self, actor_uid: impl Into<String>) -> Self {
        self.actor_uid = actor_uid.into();
        self
    }
}

/// A row of the `notifications` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: String,
    pub recipient: String,
    pub template: String,
    pub status: String,
    pub status_updated: String,
    pub error: String,
    pub user: String,
    pub system_notification: bool,
    pub data: Option<String>,
    pub created: String,
}

impl NotificationRecord {
    pub fn status(&self) -> Option<NotificationStatus> {
        self.status.parse().ok()
    }

    /// Parsed `data`; empty when the column is NULL or blank.
    pub fn data_map(&self) -> Result<NotificationData, serde_json::Error> {
        parse_data(self.data.as_deref())
    }
}

/// A notification joined with its recipient, actor and template, as read by
/// the send engine.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingNotification {
    pub id: String,
    pub recipient_email: String,
    pub recipient_name: String,
    pub notification_type: String,
    pub user_name: String,
    pub subject: String,
    pub text_email: String,
    pub status: String,
    pub status_updated: String,
    pub error: String,
    pub user: String,
    pub system_notification: bool,
    pub data: Option<String>,
}

impl PendingNotification {
    /// Rendering variables: the builtins, then every key of `data` on top.
    pub fn template_variables(&self) -> Result<NotificationData, serde_json::Error> {
        let mut variables = NotificationData::new();
        variables.insert("Id".into(), Value::from(self.id.as_str()));
        variables.insert("RecipientEmail".into(), Value::from(self.recipient_email.as_str()));
        variables.insert("RecipientName".into(), Value::from(self.recipient_name.as_str()));
        variables.insert(
            "NotificationType".into(),
            Value::from(self.notification_type.as_str()),
        );
        variables.insert("UserName".into(), Value::from(self.user_name.as_str()));
        variables.insert("Subject".into(), Value::from(self.subject.as_str()));
        variables.insert("Template".into(), Value::from(self.text_email.as_str()));
        variables.insert("Status".into(), Value::from(self.status.as_str()));
        variables.insert("StatusUpdated".into(), Value::from(self.status_updated.as_str()));
        variables.insert("Error".into(), Value::from(self.error.as_str()));
        variables.insert("UserId".into(), Value::from(self.user.as_str()));
        variables.insert(
            "SystemNotification".into(),
            Value::from(self.system_notification),
        );

        variables.extend(parse_data(self.data.as_deref())?);
        Ok(variables)
    }
}

pub(crate) fn parse_data(raw: Option<&str>) -> Result<NotificationData, serde_json::Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(NotificationData::new()),
        Some(raw) => serde_json::from_str(raw),
    }
}

/// Row counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub inflight: i64,
    pub sent: i64,
    pub error: i64,
}

impl StatusCounts {
    pub fn get(&self, status: NotificationStatus) -> i64 {
        match status {
            NotificationStatus::Pending => self.pending,
            NotificationStatus::Inflight => self.inflight,
            NotificationStatus::Sent => self.sent,
            NotificationStatus::Error => self.error,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.inflight + self.sent + self.error
    }
}
