//! The concrete reminder jobs.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::job::{DedupeSpec, ReminderEngine, ReminderJob, ReminderOutcome};
use super::week::{format_date, parse_date, previous_week_ending};
use crate::clock::format_timestamp;
use crate::database::{SqlValue, TextRow};
use crate::notification::{NotificationData, NotifyError};

pub const TIMESHEET_SUBMISSION_TEMPLATE: &str = "timesheet_submission_reminder";
pub const TIMESHEET_APPROVAL_TEMPLATE: &str = "timesheet_approval_reminder";
pub const EXPENSE_APPROVAL_TEMPLATE: &str = "expense_approval_reminder";
pub const PO_SECOND_APPROVAL_TEMPLATE: &str = "po_second_approval_required";

const TIMESHEET_SUBMISSION_QUERY: &str = r#"
    SELECT DISTINCT
        p.uid AS recipient_uid
    FROM profiles p
    LEFT JOIN time_sheets ts ON ts.uid = p.uid AND ts.week_ending = ? AND ts.submitted = 1
    LEFT JOIN admin_profiles ap ON ap.uid = p.uid
    WHERE ts.id IS NULL
      AND COALESCE(ap.time_sheet_expected, 0) = 1
"#;

const TIMESHEET_APPROVAL_QUERY: &str = r#"
    SELECT DISTINCT
        ts.approver AS manager_uid
    FROM time_sheets ts
    WHERE ts.submitted = 1
      AND ts.approved = ''
      AND ts.committed = ''
      AND ts.rejected = ''
      AND ts.approver != ''
"#;

const EXPENSE_APPROVAL_QUERY: &str = r#"
    SELECT DISTINCT
        e.approver AS manager_uid
    FROM expenses e
    WHERE e.submitted = 1
      AND e.approved = ''
      AND e.committed = ''
      AND e.rejected = ''
      AND e.approver != ''
"#;

const PO_SECOND_APPROVER_QUERY: &str = r#"
    SELECT id
    FROM pending_items_for_qualified_po_second_approvers
    WHERE num_pos_qualified > 0
"#;

/// Pending/inflight reminders for the same week suppress a new one.
const WEEK_ENDING_DEDUPE: &str = "json_extract(n.data, '$.WeekEnding') = ?";

/// Pending/inflight reminders created after the cutoff suppress a new one.
const CREATED_SINCE_DEDUPE: &str = "n.created > ?";

/// Named reminder jobs, as registered with the scheduler and the trigger API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    TimesheetSubmission,
    TimesheetApproval,
    ExpenseApproval,
    PoSecondApproval,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 4] = [
        ReminderKind::TimesheetSubmission,
        ReminderKind::TimesheetApproval,
        ReminderKind::ExpenseApproval,
        ReminderKind::PoSecondApproval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::TimesheetSubmission => "timesheet_submission",
            ReminderKind::TimesheetApproval => "timesheet_approval",
            ReminderKind::ExpenseApproval => "expense_approval",
            ReminderKind::PoSecondApproval => "po_second_approval",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderKind {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReminderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| NotifyError::UnknownJob(s.to_string()))
    }
}

fn action_data(action_url: String) -> impl Fn(&TextRow) -> NotificationData + Send + Sync + 'static {
    move |_row| {
        let mut data = NotificationData::new();
        data.insert("ActionURL".into(), Value::from(action_url.clone()));
        data
    }
}

impl ReminderEngine {
    /// Run a named job. `week_ending` only applies to timesheet submission
    /// reminders and defaults to the previous week.
    pub async fn run_named(
        &self,
        kind: ReminderKind,
        send: bool,
        week_ending: Option<&str>,
    ) -> Result<ReminderOutcome, NotifyError> {
        match kind {
            ReminderKind::TimesheetSubmission => match week_ending {
                Some(week) => {
                    self.queue_timesheet_submission_reminders_for_week(week, send)
                        .await
                }
                None => self.queue_timesheet_submission_reminders(send).await,
            },
            ReminderKind::TimesheetApproval => self.queue_timesheet_approval_reminders(send).await,
            ReminderKind::ExpenseApproval => self.queue_expense_approval_reminders(send).await,
            ReminderKind::PoSecondApproval => {
                self.queue_po_second_approver_notifications(send).await
            }
        }
    }

    /// Remind users who have not submitted a timesheet for last week.
    pub async fn queue_timesheet_submission_reminders(
        &self,
        send: bool,
    ) -> Result<ReminderOutcome, NotifyError> {
        let today = self.engine.clock().now().date_naive();
        let week_ending = format_date(previous_week_ending(today));
        self.queue_timesheet_submission_reminders_for_week(&week_ending, send)
            .await
    }

    /// Remind users expected to submit a timesheet who have none submitted for
    /// `week_ending`. One live reminder per user and week.
    pub async fn queue_timesheet_submission_reminders_for_week(
        &self,
        week_ending: &str,
        send: bool,
    ) -> Result<ReminderOutcome, NotifyError> {
        let week_ending = format_date(parse_date(week_ending)?);
        let action_url = self.engine.urls().build("/time/entries/list");

        let dedupe_week = week_ending.clone();
        let data_week = week_ending.clone();
        let job = ReminderJob::new(
            ReminderKind::TimesheetSubmission.as_str(),
            TIMESHEET_SUBMISSION_TEMPLATE,
            TIMESHEET_SUBMISSION_QUERY,
            "recipient_uid",
        )
        .params(vec![SqlValue::from(week_ending.as_str())])
        .dedupe(
            DedupeSpec::new(WEEK_ENDING_DEDUPE)
                .with_params(move |_row| vec![SqlValue::from(dedupe_week.as_str())]),
        )
        .data(move |_row| {
            let mut data = NotificationData::new();
            data.insert("WeekEnding".into(), Value::from(data_week.as_str()));
            data.insert("ActionURL".into(), Value::from(action_url.as_str()));
            data
        })
        .log_field("week_ending", week_ending.as_str());

        self.run(&job, send).await
    }

    /// Remind managers with submitted timesheets awaiting approval, at most
    /// once per rolling 24 hours.
    pub async fn queue_timesheet_approval_reminders(
        &self,
        send: bool,
    ) -> Result<ReminderOutcome, NotifyError> {
        let job = ReminderJob::new(
            ReminderKind::TimesheetApproval.as_str(),
            TIMESHEET_APPROVAL_TEMPLATE,
            TIMESHEET_APPROVAL_QUERY,
            "manager_uid",
        )
        .dedupe(self.created_within_last_day())
        .data(action_data(self.engine.urls().build("/time/sheets/pending")));

        self.run(&job, send).await
    }

    /// Remind managers with submitted expenses awaiting approval, at most
    /// once per rolling 24 hours.
    pub async fn queue_expense_approval_reminders(
        &self,
        send: bool,
    ) -> Result<ReminderOutcome, NotifyError> {
        let job = ReminderJob::new(
            ReminderKind::ExpenseApproval.as_str(),
            EXPENSE_APPROVAL_TEMPLATE,
            EXPENSE_APPROVAL_QUERY,
            "manager_uid",
        )
        .dedupe(self.created_within_last_day())
        .data(action_data(self.engine.urls().build("/expenses/pending")));

        self.run(&job, send).await
    }

    /// Notify users qualified to second-approve purchase orders that have
    /// waited more than a day. The view yields one row per user, so there is
    /// no dedupe.
    pub async fn queue_po_second_approver_notifications(
        &self,
        send: bool,
    ) -> Result<ReminderOutcome, NotifyError> {
        let job = ReminderJob::new(
            ReminderKind::PoSecondApproval.as_str(),
            PO_SECOND_APPROVAL_TEMPLATE,
            PO_SECOND_APPROVER_QUERY,
            "id",
        )
        .data(action_data(self.engine.urls().build("/pos/list")));

        self.run(&job, send).await
    }

    fn created_within_last_day(&self) -> DedupeSpec {
        let cutoff = format_timestamp(self.engine.clock().now() - Duration::hours(24));
        DedupeSpec::new(CREATED_SINCE_DEDUPE)
            .with_params(move |_row| vec![SqlValue::from(cutoff.as_str())])
    }
}
