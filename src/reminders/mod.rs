//! Scheduled reminder jobs.
//!
//! Each job selects candidate recipients with a query, skips recipients that
//! already hold a live reminder, queues one deferred notification per
//! remaining recipient and optionally drains the queue.

mod job;
mod jobs;
mod week;

pub use job::{DedupeSpec, ReminderEngine, ReminderJob, ReminderOutcome, RowData, RowParams};
pub use jobs::{
    ReminderKind, EXPENSE_APPROVAL_TEMPLATE, PO_SECOND_APPROVAL_TEMPLATE,
    TIMESHEET_APPROVAL_TEMPLATE, TIMESHEET_SUBMISSION_TEMPLATE,
};
pub use week::{format_date, parse_date, previous_week_ending, week_ending};
