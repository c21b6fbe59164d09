//! Send engine integration tests: claim, render, deliver, record.

mod common;

use serde_json::json;

use backoffice_notification_service::notification::{
    DeliveryMode, DispatchArgs, NotificationStatus, NotifyError,
};

use common::{data, setup, setup_file_backed, TestEnv};

const CODE: &str = "welcome";

async fn env_with_template(body: &str) -> TestEnv {
    let env = setup().await;
    env.template(CODE, "Hello", body).await;
    env.profile("u1", "Ada", "Lovelace", "").await;
    env.enable(&[(CODE, true)]).await;
    env
}

async fn queue(env: &TestEnv, recipient: &str, payload: serde_json::Value) -> String {
    env.engine
        .dispatch(DispatchArgs::new(CODE, recipient, DeliveryMode::Deferred).data(data(payload)))
        .await
        .expect("dispatch")
        .expect("notification created")
}

#[tokio::test]
async fn test_deferred_then_drain_delivers_once() {
    let env = env_with_template("Hi {{ RecipientName }}, see {{ ActionURL }}").await;
    let id = queue(&env, "u1", json!({"ActionURL": "https://bo.example.com/x"})).await;

    let pending = env.notification(&id).await;
    assert_eq!(pending.status(), Some(NotificationStatus::Pending));
    assert!(env.mailer.attempts().is_empty());

    let sent = env.engine.drain().await.expect("drain");
    assert_eq!(sent, 1);
    env.settle().await;

    let row = env.notification(&id).await;
    assert_eq!(row.status(), Some(NotificationStatus::Sent));
    assert!(row.status_updated > pending.status_updated);
    assert_eq!(row.error, "");

    let delivered = env.mailer.sent_to("u1@example.com");
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].subject, "Hello");
    assert_eq!(delivered[0].text, "Hi Ada Lovelace, see https://bo.example.com/x");
    assert_eq!(delivered[0].from.address, "noreply@example.com");
    assert_eq!(delivered[0].to.name, "Ada Lovelace");
}

#[tokio::test]
async fn test_drain_on_empty_queue_returns_zero() {
    let env = env_with_template("Hi").await;
    assert_eq!(env.engine.drain().await.expect("drain"), 0);
    assert_eq!(env.engine.send_next_pending().await.expect("send next"), 0);
}

#[tokio::test]
async fn test_send_next_pending_reports_remaining() {
    let env = env_with_template("Hi {{ RecipientName }}").await;
    queue(&env, "u1", json!({})).await;
    queue(&env, "u1", json!({})).await;

    assert_eq!(env.engine.send_next_pending().await.expect("first"), 1);
    assert_eq!(env.engine.send_next_pending().await.expect("second"), 0);
    env.settle().await;
    assert_eq!(env.count_with_status(NotificationStatus::Sent).await, 2);
}

#[tokio::test]
async fn test_missing_variable_closes_row_as_error_without_sending() {
    let env = env_with_template("Hi {{ NotThere }}").await;
    let id = queue(&env, "u1", json!({})).await;

    let err = env.engine.drain().await.expect_err("render must fail");
    assert_eq!(err.sent, 0);
    assert!(matches!(err.source, NotifyError::Render { .. }));
    env.settle().await;

    let row = env.notification(&id).await;
    assert_eq!(row.status(), Some(NotificationStatus::Error));
    assert!(!row.error.is_empty());
    assert!(env.mailer.attempts().is_empty());

    // The failed row no longer blocks the queue.
    assert_eq!(env.engine.drain().await.expect("drain"), 0);
}

#[tokio::test]
async fn test_legacy_placeholder_is_a_render_failure() {
    let env = env_with_template("Open {APP_URL}/time").await;
    let id = queue(&env, "u1", json!({})).await;

    let err = env.engine.send_by_id(&id).await.expect_err("sentinel must fail");
    assert!(matches!(err, NotifyError::Render { .. }));

    let row = env.notification(&id).await;
    assert_eq!(row.status(), Some(NotificationStatus::Error));
    assert!(row.error.contains("{APP_URL}"));
    assert!(env.mailer.attempts().is_empty());
}

#[tokio::test]
async fn test_empty_data_renders_builtins() {
    let env = env_with_template("{{ RecipientName }} <{{ RecipientEmail }}> {{ Status }}").await;
    let id = queue(&env, "u1", json!({})).await;
    assert_eq!(env.notification(&id).await.data, None);

    env.engine.send_by_id(&id).await.expect("send");
    env.settle().await;

    let delivered = env.mailer.sent();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].text, "Ada Lovelace <u1@example.com> pending");
}

#[tokio::test]
async fn test_data_keys_override_builtins() {
    let env = env_with_template("{{ RecipientName }}").await;
    let id = queue(&env, "u1", json!({"RecipientName": "Countess"})).await;

    env.engine.send_by_id(&id).await.expect("send");
    env.settle().await;
    assert_eq!(env.mailer.sent()[0].text, "Countess");
}

#[tokio::test]
async fn test_transport_failure_is_recorded_not_returned() {
    let env = env_with_template("Hi").await;
    env.mailer.fail_for("u1@example.com");
    let id = queue(&env, "u1", json!({})).await;

    env.engine.send_by_id(&id).await.expect("send_by_id succeeds");
    env.settle().await;

    let row = env.notification(&id).await;
    assert_eq!(row.status(), Some(NotificationStatus::Error));
    assert!(!row.error.is_empty());
    assert_eq!(env.mailer.attempts().len(), 1);
    assert!(env.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_mailer_panic_is_recorded() {
    let env = env_with_template("Hi").await;
    env.mailer.panic_for("u1@example.com");
    let id = queue(&env, "u1", json!({})).await;

    env.engine.send_by_id(&id).await.expect("send_by_id succeeds");
    env.settle().await;

    let row = env.notification(&id).await;
    assert_eq!(row.status(), Some(NotificationStatus::Error));
    assert!(row.error.starts_with("mailer panicked"));
}

#[tokio::test]
async fn test_send_by_id_ignores_missing_and_finished_rows() {
    let env = env_with_template("Hi").await;
    env.engine.send_by_id("does-not-exist").await.expect("missing is a no-op");

    let id = queue(&env, "u1", json!({})).await;
    env.engine.send_by_id(&id).await.expect("send");
    env.settle().await;
    let sent = env.notification(&id).await;

    env.engine.send_by_id(&id).await.expect("second send is a no-op");
    env.settle().await;

    assert_eq!(env.notification(&id).await.status_updated, sent.status_updated);
    assert_eq!(env.mailer.attempts().len(), 1);
}

#[tokio::test]
async fn test_recipient_without_profile_is_closed_as_error() {
    let env = env_with_template("Hi").await;
    let id = queue(&env, "ghost", json!({})).await;

    let err = env.engine.send_by_id(&id).await.expect_err("no address");
    assert!(matches!(err, NotifyError::MissingRecipientEmail { .. }));
    assert_eq!(env.notification(&id).await.status(), Some(NotificationStatus::Error));
    assert!(env.mailer.attempts().is_empty());
}

#[tokio::test]
async fn test_status_changes_strictly_advance_stamp() {
    let env = env_with_template("Hi").await;
    let id = queue(&env, "u1", json!({})).await;
    let created = env.notification(&id).await;
    assert_eq!(created.created, created.status_updated);

    env.engine.send_by_id(&id).await.expect("send");
    env.settle().await;

    let finished = env.notification(&id).await;
    assert!(finished.status_updated > created.status_updated);
    assert_eq!(finished.created, created.created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_senders_deliver_each_row_once() {
    const ROWS: usize = 40;

    let env = setup_file_backed(8).await;
    env.template(CODE, "Hello", "Hi {{ RecipientName }}").await;
    env.profile("u1", "Ada", "Lovelace", "").await;
    env.enable(&[(CODE, true)]).await;

    let mut ids = Vec::with_capacity(ROWS);
    for _ in 0..ROWS {
        ids.push(queue(&env, "u1", json!({})).await);
    }

    let mut tasks = tokio::task::JoinSet::new();
    for id in ids.iter().take(20) {
        for _ in 0..3 {
            let engine = env.engine.clone();
            let id = id.clone();
            tasks.spawn(async move {
                let _ = engine.send_by_id(&id).await;
            });
        }
    }
    for _ in 0..6 {
        let engine = env.engine.clone();
        tasks.spawn(async move {
            let _ = engine.drain().await;
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.expect("sender task");
    }

    // Anything a racing drain stopped short of.
    env.engine.drain().await.expect("final drain");
    env.settle().await;

    assert_eq!(env.mailer.attempts().len(), ROWS);
    assert_eq!(env.count_with_status(NotificationStatus::Sent).await, ROWS as i64);
    assert_eq!(env.count_with_status(NotificationStatus::Pending).await, 0);
    assert_eq!(env.count_with_status(NotificationStatus::Inflight).await, 0);
    assert_eq!(env.count_with_status(NotificationStatus::Error).await, 0);
}
