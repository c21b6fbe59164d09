//! HTTP triggers for engine operations
//!
//! - Dispatch a notification, send one by id, drain the queue
//! - Run a named reminder job
//! - Raise rejection and share events

mod handlers;
mod models;

pub use handlers::{
    dispatch_notification, drain_notifications, expense_rejected, run_reminder,
    send_notification, timesheet_rejected, timesheet_shared,
};

pub use models::{
    DispatchRequest, DispatchResponse, DrainResponse, ExpenseRejectedRequest, RunReminderRequest,
    SendResponse, TimesheetRejectedRequest, TimesheetSharedRequest,
};
