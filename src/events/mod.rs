//! Notifications raised by business events: rejections and shares.
//!
//! Each event resolves its recipients, builds the template data once and
//! dispatches an immediate notification per recipient. A failure for one
//! recipient is logged and does not stop the others.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::NotificationEngine;
use crate::notification::{DeliveryMode, DispatchArgs, NotificationData, NotifyError};

pub const TIMESHEET_REJECTED_TEMPLATE: &str = "timesheet_rejected";
pub const EXPENSE_REJECTED_TEMPLATE: &str = "expense_rejected";
pub const TIMESHEET_SHARED_TEMPLATE: &str = "timesheet_shared";

/// The timesheet fields events need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimesheetRecord {
    pub id: String,
    /// Owner uid
    pub uid: String,
    pub week_ending: String,
}

/// The expense fields events need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: String,
    /// Owner uid
    pub uid: String,
    pub date: String,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    pub recipients: usize,
    pub created: usize,
}

/// Owner, then the rejector and the owner's manager when they are set and not
/// already listed.
pub fn rejection_recipients(owner: &str, rejector: &str, manager: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::with_capacity(3);
    for uid in [owner, rejector, manager] {
        if !uid.is_empty() && !recipients.iter().any(|r| r == uid) {
            recipients.push(uid.to_string());
        }
    }
    recipients
}

/// `$` and two decimals.
pub fn format_amount(total: f64) -> String {
    format!("${:.2}", total)
}

#[derive(Clone)]
pub struct EventQueuer {
    engine: NotificationEngine,
}

impl EventQueuer {
    pub fn new(engine: NotificationEngine) -> Self {
        Self { engine }
    }

    /// Tell the owner, the rejector and the owner's manager that a timesheet
    /// was rejected.
    #[tracing::instrument(
        name = "event.timesheet_rejected",
        skip(self, timesheet, reason),
        fields(timesheet_id = %timesheet.id, rejector_uid = %rejector_uid)
    )]
    pub async fn queue_timesheet_rejected(
        &self,
        timesheet: &TimesheetRecord,
        rejector_uid: &str,
        reason: &str,
    ) -> Result<EventOutcome, NotifyError> {
        let profiles = self.engine.profiles();
        let owner = profiles.find(&timesheet.uid).await?;
        let rejector = profiles.find(rejector_uid).await?;

        let mut data = NotificationData::new();
        data.insert("EmployeeName".into(), Value::from(owner.display_name()));
        data.insert("WeekEnding".into(), Value::from(timesheet.week_ending.as_str()));
        data.insert("RejectorName".into(), Value::from(rejector.display_name()));
        data.insert("RejectionReason".into(), Value::from(reason));
        data.insert(
            "ActionURL".into(),
            Value::from(
                self.engine
                    .urls()
                    .build(&format!("/time/sheets/{}/details", timesheet.id)),
            ),
        );

        let recipients = rejection_recipients(&owner.uid, rejector_uid, &owner.manager);
        let outcome = self
            .dispatch_all(TIMESHEET_REJECTED_TEMPLATE, &recipients, data, "")
            .await;
        tracing::info!(
            created_count = outcome.created,
            recipient_count = outcome.recipients,
            "Queued timesheet rejection notifications"
        );
        Ok(outcome)
    }

    /// Tell the owner, the rejector and the owner's manager that an expense
    /// was rejected.
    #[tracing::instrument(
        name = "event.expense_rejected",
        skip(self, expense, reason),
        fields(expense_id = %expense.id, rejector_uid = %rejector_uid)
    )]
    pub async fn queue_expense_rejected(
        &self,
        expense: &ExpenseRecord,
        rejector_uid: &str,
        reason: &str,
    ) -> Result<EventOutcome, NotifyError> {
        let profiles = self.engine.profiles();
        let owner = profiles.find(&expense.uid).await?;
        let rejector = profiles.find(rejector_uid).await?;

        let mut data = NotificationData::new();
        data.insert("EmployeeName".into(), Value::from(owner.display_name()));
        data.insert("ExpenseDate".into(), Value::from(expense.date.as_str()));
        data.insert("ExpenseAmount".into(), Value::from(format_amount(expense.total)));
        data.insert("RejectorName".into(), Value::from(rejector.display_name()));
        data.insert("RejectionReason".into(), Value::from(reason));
        data.insert(
            "ActionURL".into(),
            Value::from(
                self.engine
                    .urls()
                    .build(&format!("/expenses/{}/details", expense.id)),
            ),
        );

        let recipients = rejection_recipients(&owner.uid, rejector_uid, &owner.manager);
        let outcome = self
            .dispatch_all(EXPENSE_REJECTED_TEMPLATE, &recipients, data, "")
            .await;
        tracing::info!(
            created_count = outcome.created,
            recipient_count = outcome.recipients,
            "Queued expense rejection notifications"
        );
        Ok(outcome)
    }

    /// Tell newly added viewers that a timesheet was shared with them.
    #[tracing::instrument(
        name = "event.timesheet_shared",
        skip(self, timesheet, viewer_uids),
        fields(timesheet_id = %timesheet.id, sharer_uid = %sharer_uid)
    )]
    pub async fn queue_timesheet_shared(
        &self,
        timesheet: &TimesheetRecord,
        sharer_uid: &str,
        viewer_uids: &[String],
    ) -> Result<EventOutcome, NotifyError> {
        if viewer_uids.is_empty() {
            return Ok(EventOutcome::default());
        }

        let profiles = self.engine.profiles();
        let owner = profiles.find(&timesheet.uid).await?;
        let sharer = profiles.find(sharer_uid).await?;

        let mut data = NotificationData::new();
        data.insert("UserName".into(), Value::from(sharer.display_name()));
        data.insert("EmployeeName".into(), Value::from(owner.display_name()));
        data.insert("WeekEnding".into(), Value::from(timesheet.week_ending.as_str()));
        data.insert(
            "ActionURL".into(),
            Value::from(
                self.engine
                    .urls()
                    .build(&format!("/time/sheets/{}/details", timesheet.id)),
            ),
        );

        let outcome = self
            .dispatch_all(TIMESHEET_SHARED_TEMPLATE, viewer_uids, data, sharer_uid)
            .await;
        tracing::info!(
            created_count = outcome.created,
            recipient_count = outcome.recipients,
            "Queued timesheet shared notifications"
        );
        Ok(outcome)
    }

    async fn dispatch_all(
        &self,
        template_code: &str,
        recipients: &[String],
        data: NotificationData,
        actor_uid: &str,
    ) -> EventOutcome {
        let mut outcome = EventOutcome {
            recipients: recipients.len(),
            created: 0,
        };

        for recipient_uid in recipients {
            let args = DispatchArgs::new(template_code, recipient_uid, DeliveryMode::Immediate)
                .data(data.clone())
                .system(true)
                .actor(actor_uid);
            match self.engine.dispatch(args).await {
                Ok(Some(_)) => outcome.created += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        template_code = %template_code,
                        recipient_uid = %recipient_uid,
                        error = %e,
                        "Error creating notification"
                    );
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_recipients_distinct_in_order() {
        assert_eq!(rejection_recipients("u1", "m1", "m2"), vec!["u1", "m1", "m2"]);
        assert_eq!(rejection_recipients("u1", "m1", "m1"), vec!["u1", "m1"]);
        assert_eq!(rejection_recipients("u1", "u1", ""), vec!["u1"]);
        assert_eq!(rejection_recipients("u1", "m1", "u1"), vec!["u1", "m1"]);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(42.5), "$42.50");
        assert_eq!(format_amount(0.0), "$0.00");
        assert_eq!(format_amount(1234.5), "$1234.50");
    }
}
