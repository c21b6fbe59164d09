//! Shared harness for the integration tests: a database with the schema
//! applied, a recording mailer and a hand-driven clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use backoffice_notification_service::clock::{format_timestamp, ManualClock};
use backoffice_notification_service::config::DatabaseConfig;
use backoffice_notification_service::database::DatabasePool;
use backoffice_notification_service::engine::{EngineOptions, NotificationEngine};
use backoffice_notification_service::feature::NOTIFICATIONS_DOMAIN;
use backoffice_notification_service::mailer::MemoryMailer;
use backoffice_notification_service::notification::{NotificationRecord, NotificationStatus};
use backoffice_notification_service::profile::Profile;
use backoffice_notification_service::template::Template;

pub const BASE_URL: &str = "https://bo.example.com/";

pub struct TestEnv {
    pub db: DatabasePool,
    pub mailer: Arc<MemoryMailer>,
    pub clock: Arc<ManualClock>,
    pub engine: NotificationEngine,
    /// Holds the database file of a file-backed environment.
    pub dir: Option<tempfile::TempDir>,
}

/// Tuesday 2025-03-04 10:00 UTC.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap()
}

pub async fn setup() -> TestEnv {
    let db = DatabasePool::in_memory().await.expect("in-memory database");
    build(db, None)
}

/// An environment on a WAL database file with `pool_size` connections, so
/// concurrent senders really race each other.
pub async fn setup_file_backed(pool_size: u32) -> TestEnv {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("notifications.db").display()),
        pool_size,
        ..DatabaseConfig::default()
    };
    let db = DatabasePool::connect(&config).await.expect("file database");
    build(db, Some(dir))
}

fn build(db: DatabasePool, dir: Option<tempfile::TempDir>) -> TestEnv {
    let mailer = Arc::new(MemoryMailer::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = NotificationEngine::new(
        db.pool().clone(),
        mailer.clone(),
        clock.clone(),
        EngineOptions {
            base_url: BASE_URL.to_string(),
            sender_name: "Back Office".to_string(),
            sender_address: "noreply@example.com".to_string(),
        },
    );

    TestEnv {
        db,
        mailer,
        clock,
        engine,
        dir,
    }
}

impl TestEnv {
    pub async fn template(&self, code: &str, subject: &str, body: &str) {
        self.engine
            .templates()
            .upsert(&Template {
                id: format!("tpl_{}", code),
                code: code.to_string(),
                subject: subject.to_string(),
                text_email: body.to_string(),
                description: String::new(),
            })
            .await
            .expect("upsert template");
    }

    pub async fn profile(&self, uid: &str, given: &str, surname: &str, manager: &str) {
        self.engine
            .profiles()
            .upsert(&Profile {
                uid: uid.to_string(),
                given_name: given.to_string(),
                surname: surname.to_string(),
                email: format!("{}@example.com", uid),
                manager: manager.to_string(),
                notification_type: "text_email".to_string(),
            })
            .await
            .expect("upsert profile");
    }

    /// Turn notifications on (or off) for each code.
    pub async fn enable(&self, codes: &[(&str, bool)]) {
        let mut value = Map::new();
        for (code, enabled) in codes {
            value.insert(code.to_string(), Value::Bool(*enabled));
        }
        self.engine
            .features()
            .set_domain(NOTIFICATIONS_DOMAIN, &Value::Object(value))
            .await
            .expect("set feature domain");
    }

    pub async fn expect_timesheet(&self, uid: &str) {
        sqlx::query("INSERT INTO admin_profiles (uid, time_sheet_expected) VALUES (?, 1)")
            .bind(uid)
            .execute(self.db.pool())
            .await
            .expect("insert admin profile");
    }

    pub async fn timesheet(&self, id: &str, uid: &str, week_ending: &str, submitted: bool, approver: &str) {
        sqlx::query(
            "INSERT INTO time_sheets (id, uid, week_ending, submitted, approver) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(uid)
        .bind(week_ending)
        .bind(submitted)
        .bind(approver)
        .execute(self.db.pool())
        .await
        .expect("insert time sheet");
    }

    pub async fn expense(&self, id: &str, uid: &str, total: f64, approver: &str) {
        sqlx::query(
            "INSERT INTO expenses (id, uid, date, total, submitted, approver) VALUES (?, ?, '2025-02-27', ?, 1, ?)",
        )
        .bind(id)
        .bind(uid)
        .bind(total)
        .bind(approver)
        .execute(self.db.pool())
        .await
        .expect("insert expense");
    }

    /// A purchase order awaiting second approval for `approver_uid`, first
    /// approved long ago.
    pub async fn po_awaiting_second_approval(&self, id: &str, approver_uid: &str) {
        sqlx::query(
            "INSERT INTO purchase_orders (id, status, second_approval_required, approved) \
             VALUES (?, 'Unapproved', 1, '2000-01-01 00:00:00.000000Z')",
        )
        .bind(id)
        .execute(self.db.pool())
        .await
        .expect("insert purchase order");
        sqlx::query("INSERT INTO po_second_approvers (uid, purchase_order) VALUES (?, ?)")
            .bind(approver_uid)
            .bind(id)
            .execute(self.db.pool())
            .await
            .expect("insert second approver");
    }

    pub async fn notification(&self, id: &str) -> NotificationRecord {
        self.engine
            .store()
            .get(id)
            .await
            .expect("read notification")
            .expect("notification exists")
    }

    pub async fn notifications_for(&self, uid: &str) -> Vec<NotificationRecord> {
        self.engine
            .store()
            .find_by_recipient(uid)
            .await
            .expect("read notifications")
    }

    pub async fn count_with_status(&self, status: NotificationStatus) -> i64 {
        self.engine
            .store()
            .counts_by_status()
            .await
            .expect("count notifications")
            .get(status)
    }

    pub async fn total_notifications(&self) -> i64 {
        self.engine
            .store()
            .counts_by_status()
            .await
            .expect("count notifications")
            .total()
    }

    /// Wait for spawned deliveries to write their terminal status.
    pub async fn settle(&self) {
        self.engine.wait_for_deliveries().await;
    }

    pub fn now_stamp(&self) -> String {
        use backoffice_notification_service::clock::Clock;
        format_timestamp(self.clock.now())
    }
}

pub fn data(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn empty_data() -> Map<String, Value> {
    data(json!({}))
}
