use serde::{Deserialize, Serialize};

use crate::events::{ExpenseRecord, TimesheetRecord};
use crate::notification::NotificationData;

fn default_mode() -> String {
    "immediate".to_string()
}

/// Request to create a notification
#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    /// Template code, e.g. "timesheet_rejected"
    pub template_code: String,
    /// Recipient profile uid
    pub recipient_uid: String,
    /// Template variables
    #[serde(default)]
    pub data: NotificationData,
    #[serde(default)]
    pub system: bool,
    /// User whose action produced the notification
    #[serde(default)]
    pub actor_uid: String,
    /// "immediate" or "deferred"; validated by the handler
    #[serde(default = "default_mode")]
    pub mode: String,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    /// False when the notifications feature for the template is off
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    pub mode: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub notification_id: String,
    /// Status right after the send attempt; delivery may still be in flight
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct DrainResponse {
    pub sent: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunReminderRequest {
    /// Drain the queue after queuing reminders
    #[serde(default)]
    pub send: bool,
    /// Timesheet submission reminders only; defaults to last week
    pub week_ending: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimesheetRejectedRequest {
    pub timesheet: TimesheetRecord,
    pub rejector_uid: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseRejectedRequest {
    pub expense: ExpenseRecord,
    pub rejector_uid: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct TimesheetSharedRequest {
    pub timesheet: TimesheetRecord,
    pub sharer_uid: String,
    /// Newly added viewers only
    #[serde(default)]
    pub viewer_uids: Vec<String>,
}
