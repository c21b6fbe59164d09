//! Event queuer integration tests: rejection fan-out and shares.

mod common;

use serde_json::json;

use backoffice_notification_service::events::{
    ExpenseRecord, TimesheetRecord, EXPENSE_REJECTED_TEMPLATE, TIMESHEET_REJECTED_TEMPLATE,
    TIMESHEET_SHARED_TEMPLATE,
};
use backoffice_notification_service::notification::{NotificationStatus, NotifyError};
use backoffice_notification_service::profile::ProfileError;

use common::{setup, TestEnv};

async fn event_env() -> TestEnv {
    let env = setup().await;
    env.template(
        EXPENSE_REJECTED_TEMPLATE,
        "Expense rejected",
        "{{ RejectorName }} rejected the {{ ExpenseAmount }} expense of {{ EmployeeName }} from {{ ExpenseDate }}: {{ RejectionReason }}",
    )
    .await;
    env.template(
        TIMESHEET_REJECTED_TEMPLATE,
        "Timesheet rejected",
        "{{ RejectorName }} rejected the timesheet of {{ EmployeeName }} for {{ WeekEnding }}",
    )
    .await;
    env.template(
        TIMESHEET_SHARED_TEMPLATE,
        "Timesheet shared",
        "{{ UserName }} shared the timesheet of {{ EmployeeName }} for {{ WeekEnding }}",
    )
    .await;
    env.enable(&[
        (EXPENSE_REJECTED_TEMPLATE, true),
        (TIMESHEET_REJECTED_TEMPLATE, true),
        (TIMESHEET_SHARED_TEMPLATE, true),
    ])
    .await;
    env.profile("u1", "Ada", "Lovelace", "m2").await;
    env.profile("m1", "Mary", "Rejector", "").await;
    env.profile("m2", "Max", "Manager", "").await;
    env
}

fn expense() -> ExpenseRecord {
    ExpenseRecord {
        id: "e1".to_string(),
        uid: "u1".to_string(),
        date: "2025-02-27".to_string(),
        total: 42.5,
    }
}

fn timesheet() -> TimesheetRecord {
    TimesheetRecord {
        id: "ts1".to_string(),
        uid: "u1".to_string(),
        week_ending: "2025-03-01".to_string(),
    }
}

#[tokio::test]
async fn test_expense_rejection_fans_out_to_three() {
    let env = event_env().await;

    let outcome = env
        .engine
        .events()
        .queue_expense_rejected(&expense(), "m1", "missing receipt")
        .await
        .expect("queue");
    assert_eq!(outcome.recipients, 3);
    assert_eq!(outcome.created, 3);
    env.settle().await;

    for uid in ["u1", "m1", "m2"] {
        let rows = env.notifications_for(uid).await;
        assert_eq!(rows.len(), 1, "one notification for {}", uid);
        let row = &rows[0];
        assert_eq!(row.status(), Some(NotificationStatus::Sent));
        assert!(row.system_notification);
        let row_data = row.data_map().expect("data");
        assert_eq!(row_data["ExpenseAmount"], json!("$42.50"));
        assert_eq!(
            row_data["ActionURL"],
            json!("https://bo.example.com/expenses/e1/details")
        );
        assert_eq!(row_data["EmployeeName"], json!("Ada Lovelace"));
        assert_eq!(row_data["RejectorName"], json!("Mary Rejector"));
    }

    let delivered = env.mailer.sent_to("m2@example.com");
    assert_eq!(
        delivered[0].text,
        "Mary Rejector rejected the $42.50 expense of Ada Lovelace from 2025-02-27: missing receipt"
    );
}

#[tokio::test]
async fn test_rejection_by_manager_is_not_doubled() {
    let env = event_env().await;

    let outcome = env
        .engine
        .events()
        .queue_timesheet_rejected(&timesheet(), "m2", "hours missing")
        .await
        .expect("queue");
    assert_eq!(outcome.recipients, 2);
    assert_eq!(outcome.created, 2);
    env.settle().await;

    assert_eq!(env.notifications_for("m2").await.len(), 1);
    let row_data = env.notifications_for("u1").await[0].data_map().expect("data");
    assert_eq!(row_data["WeekEnding"], json!("2025-03-01"));
    assert_eq!(row_data["RejectionReason"], json!("hours missing"));
    assert_eq!(
        row_data["ActionURL"],
        json!("https://bo.example.com/time/sheets/ts1/details")
    );
}

#[tokio::test]
async fn test_unknown_rejector_creates_nothing() {
    let env = event_env().await;

    let err = env
        .engine
        .events()
        .queue_expense_rejected(&expense(), "nobody", "no")
        .await
        .expect_err("rejector lookup fails");
    assert!(matches!(err, NotifyError::Profile(ProfileError::NotFound(_))));
    assert_eq!(env.total_notifications().await, 0);
}

#[tokio::test]
async fn test_failure_for_one_recipient_does_not_stop_the_rest() {
    let env = event_env().await;
    env.mailer.fail_for("m1@example.com");

    let outcome = env
        .engine
        .events()
        .queue_expense_rejected(&expense(), "m1", "duplicate")
        .await
        .expect("queue");
    assert_eq!(outcome.created, 3);
    env.settle().await;

    assert_eq!(
        env.notifications_for("m1").await[0].status(),
        Some(NotificationStatus::Error)
    );
    assert_eq!(env.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_share_notifies_new_viewers() {
    let env = event_env().await;
    env.profile("v1", "Vera", "Viewer", "").await;

    let outcome = env
        .engine
        .events()
        .queue_timesheet_shared(&timesheet(), "m2", &["v1".to_string()])
        .await
        .expect("queue");
    assert_eq!(outcome.created, 1);
    env.settle().await;

    let rows = env.notifications_for("v1").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user, "m2");
    assert_eq!(
        env.mailer.sent_to("v1@example.com")[0].text,
        "Max Manager shared the timesheet of Ada Lovelace for 2025-03-01"
    );
}

#[tokio::test]
async fn test_share_without_viewers_is_a_no_op() {
    let env = event_env().await;

    let outcome = env
        .engine
        .events()
        .queue_timesheet_shared(&timesheet(), "unknown-sharer", &[])
        .await
        .expect("no-op");
    assert_eq!(outcome.recipients, 0);
    assert_eq!(outcome.created, 0);
    assert_eq!(env.total_notifications().await, 0);
}
