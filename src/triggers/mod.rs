mod http;

pub use http::{
    dispatch_notification, drain_notifications, expense_rejected, run_reminder,
    send_notification, timesheet_rejected, timesheet_shared, DispatchRequest, DispatchResponse,
    DrainResponse, ExpenseRejectedRequest, RunReminderRequest, SendResponse,
    TimesheetRejectedRequest, TimesheetSharedRequest,
};
