//! SQL access to the `notifications` table.
//!
//! Every status write is a compare-and-set on the current status, so a row
//! can only move along the edges [`NotificationStatus::can_transition_to`]
//! allows, and every write advances `status_updated`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::types::{NotificationData, NotificationRecord, PendingNotification, StatusCounts};
use super::NotificationStatus;
use crate::clock::{format_timestamp, next_status_stamp, parse_timestamp, Clock};

const RECORD_COLUMNS: &str =
    "id, recipient, template, status, status_updated, error, user, system_notification, data, created";

/// A row to insert in state `pending`.
#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
    pub recipient_uid: &'a str,
    pub template_id: &'a str,
    pub data: &'a NotificationData,
    pub system: bool,
    pub actor_uid: &'a str,
}

/// Status and stamp of a row as last read.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StatusSnapshot {
    pub status: String,
    pub status_updated: String,
}

#[derive(Clone)]
pub struct NotificationStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl NotificationStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Stamp for a transition away from a row last stamped `previous`.
    pub fn next_stamp(&self, previous: &str) -> String {
        format_timestamp(next_status_stamp(parse_timestamp(previous), self.clock.now()))
    }

    /// Insert a `pending` row and return its id.
    ///
    /// `data` is stored as a JSON object, or NULL when empty.
    pub async fn insert(&self, new: NewNotification<'_>) -> Result<String, super::NotifyError> {
        let id = Uuid::new_v4().simple().to_string();
        let now = format_timestamp(self.clock.now());
        let data = if new.data.is_empty() {
            None
        } else {
            Some(serde_json::to_string(new.data)?)
        };

        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, recipient, template, status, status_updated, error, user, system_notification, data, created)
            VALUES (?, ?, ?, 'pending', ?, '', ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.recipient_uid)
        .bind(new.template_id)
        .bind(&now)
        .bind(new.actor_uid)
        .bind(new.system)
        .bind(data)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<NotificationRecord>, sqlx::Error> {
        sqlx::query_as::<_, NotificationRecord>(&format!(
            "SELECT {} FROM notifications WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_by_recipient(
        &self,
        recipient_uid: &str,
    ) -> Result<Vec<NotificationRecord>, sqlx::Error> {
        sqlx::query_as::<_, NotificationRecord>(&format!(
            "SELECT {} FROM notifications WHERE recipient = ? ORDER BY created, id",
            RECORD_COLUMNS
        ))
        .bind(recipient_uid)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_pending(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await
    }

    /// Any one pending id. No ordering is implied.
    pub async fn next_pending_id(&self) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM notifications WHERE status = 'pending' LIMIT 1")
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn counts_by_status(&self) -> Result<StatusCounts, sqlx::Error> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM notifications GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status.parse::<NotificationStatus>() {
                Ok(NotificationStatus::Pending) => counts.pending = count,
                Ok(NotificationStatus::Inflight) => counts.inflight = count,
                Ok(NotificationStatus::Sent) => counts.sent = count,
                Ok(NotificationStatus::Error) => counts.error = count,
                Err(_) => tracing::warn!(status = %status, count, "Unknown notification status in table"),
            }
        }
        Ok(counts)
    }

    /// Rows that have sat in `inflight` for longer than `older_than`.
    pub async fn stale_inflight(
        &self,
        older_than: Duration,
    ) -> Result<Vec<NotificationRecord>, sqlx::Error> {
        let cutoff = format_timestamp(self.clock.now() - older_than);
        sqlx::query_as::<_, NotificationRecord>(&format!(
            "SELECT {} FROM notifications WHERE status = 'inflight' AND status_updated < ? ORDER BY status_updated",
            RECORD_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
    }

    /// Current status and stamp, or `None` if the row does not exist.
    pub async fn snapshot(&self, id: &str) -> Result<Option<StatusSnapshot>, sqlx::Error> {
        sqlx::query_as::<_, StatusSnapshot>(
            "SELECT status, status_updated FROM notifications WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Move a pending row to `inflight`, provided it still carries the stamp
    /// it was read with. Returns false when another writer got there first.
    pub async fn claim(
        conn: &mut SqliteConnection,
        id: &str,
        read_stamp: &str,
        stamp: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'inflight', status_updated = ? \
             WHERE id = ? AND status = 'pending' AND status_updated = ?",
        )
        .bind(stamp)
        .bind(id)
        .bind(read_stamp)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// The row joined with recipient profile, actor profile and template.
    pub async fn fetch_joined(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<PendingNotification>, sqlx::Error> {
        sqlx::query_as::<_, PendingNotification>(
            r#"
            SELECT
                n.id,
                COALESCE(rp.email, '') AS recipient_email,
                TRIM(COALESCE(rp.given_name, '') || ' ' || COALESCE(rp.surname, '')) AS recipient_name,
                COALESCE(rp.notification_type, '') AS notification_type,
                TRIM(COALESCE(up.given_name, '') || ' ' || COALESCE(up.surname, '')) AS user_name,
                COALESCE(nt.subject, '') AS subject,
                COALESCE(nt.text_email, '') AS text_email,
                n.status,
                n.status_updated,
                n.error,
                n.user,
                n.system_notification,
                n.data
            FROM notifications n
            LEFT JOIN profiles rp ON rp.uid = n.recipient
            LEFT JOIN profiles up ON up.uid = n.user
            LEFT JOIN notification_templates nt ON nt.id = n.template
            WHERE n.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Compare-and-set status write. Returns false if the row was not in
    /// `from` or the edge is not legal.
    pub async fn transition<'e, E>(
        executor: E,
        id: &str,
        from: NotificationStatus,
        to: NotificationStatus,
        error: &str,
        stamp: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        if !from.can_transition_to(to) {
            tracing::error!(
                notification_id = %id,
                from = %from,
                to = %to,
                "Refusing illegal notification status transition"
            );
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE notifications SET status = ?, error = ?, status_updated = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(error)
        .bind(stamp)
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record the terminal state of an inflight row.
    pub async fn finish(
        &self,
        id: &str,
        inflight_stamp: &str,
        outcome: Result<(), String>,
    ) -> Result<bool, sqlx::Error> {
        let stamp = self.next_stamp(inflight_stamp);
        let (to, error) = match &outcome {
            Ok(()) => (NotificationStatus::Sent, ""),
            Err(message) => (NotificationStatus::Error, message.as_str()),
        };
        Self::transition(
            &self.pool,
            id,
            NotificationStatus::Inflight,
            to,
            error,
            &stamp,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::DatabasePool;
    use chrono::TimeZone;
    use serde_json::json;

    async fn setup() -> (DatabasePool, Arc<ManualClock>, NotificationStore) {
        let db = DatabasePool::in_memory().await.unwrap();
        sqlx::query("INSERT INTO notification_templates (id, code, subject, text_email) VALUES ('t1', 'code', 's', 'b')")
            .execute(db.pool())
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap(),
        ));
        let store = NotificationStore::new(db.pool().clone(), clock.clone());
        (db, clock, store)
    }

    async fn insert(store: &NotificationStore, data: &NotificationData) -> String {
        store
            .insert(NewNotification {
                recipient_uid: "u1",
                template_id: "t1",
                data,
                system: true,
                actor_uid: "",
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_pending_row() {
        let (_db, _clock, store) = setup().await;
        let id = insert(&store, &NotificationData::new()).await;

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), Some(NotificationStatus::Pending));
        assert_eq!(record.status_updated, record.created);
        assert!(record.data.is_none());
        assert!(record.system_notification);
        assert_eq!(store.count_pending().await.unwrap(), 1);
        assert_eq!(store.next_pending_id().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_insert_serializes_data() {
        let (_db, _clock, store) = setup().await;
        let mut data = NotificationData::new();
        data.insert("WeekEnding".into(), json!("2025-03-01"));
        let id = insert(&store, &data).await;

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.data_map().unwrap(), data);
    }

    #[tokio::test]
    async fn test_claim_requires_matching_stamp() {
        let (db, _clock, store) = setup().await;
        let id = insert(&store, &NotificationData::new()).await;
        let snapshot = store.snapshot(&id).await.unwrap().unwrap();
        let stamp = store.next_stamp(&snapshot.status_updated);

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!NotificationStore::claim(&mut conn, &id, "stale", &stamp).await.unwrap());
        assert!(NotificationStore::claim(&mut conn, &id, &snapshot.status_updated, &stamp)
            .await
            .unwrap());
        // Already inflight.
        assert!(!NotificationStore::claim(&mut conn, &id, &stamp, &stamp).await.unwrap());
        drop(conn);

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), Some(NotificationStatus::Inflight));
        assert!(record.status_updated > snapshot.status_updated);
    }

    #[tokio::test]
    async fn test_transition_rejects_illegal_edges() {
        let (db, _clock, store) = setup().await;
        let id = insert(&store, &NotificationData::new()).await;

        let moved = NotificationStore::transition(
            db.pool(),
            &id,
            NotificationStatus::Pending,
            NotificationStatus::Sent,
            "",
            "2030-01-01 00:00:00.000000Z",
        )
        .await
        .unwrap();
        assert!(!moved);

        // Wrong `from` state.
        let finished = store.finish(&id, "2025-03-04 09:00:00.000000Z", Ok(())).await.unwrap();
        assert!(!finished);
        assert_eq!(
            store.get(&id).await.unwrap().unwrap().status(),
            Some(NotificationStatus::Pending)
        );
    }

    #[tokio::test]
    async fn test_counts_and_stale_inflight() {
        let (db, clock, store) = setup().await;
        let a = insert(&store, &NotificationData::new()).await;
        let _b = insert(&store, &NotificationData::new()).await;

        let snapshot = store.snapshot(&a).await.unwrap().unwrap();
        let stamp = store.next_stamp(&snapshot.status_updated);
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(NotificationStore::claim(&mut conn, &a, &snapshot.status_updated, &stamp)
            .await
            .unwrap());
        drop(conn);

        let counts = store.counts_by_status().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.inflight, 1);
        assert_eq!(counts.total(), 2);

        assert!(store.stale_inflight(Duration::minutes(15)).await.unwrap().is_empty());
        clock.advance(Duration::minutes(30));
        let stale = store.stale_inflight(Duration::minutes(15)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, a);
    }
}
