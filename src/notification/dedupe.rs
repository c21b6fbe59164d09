use sqlx::SqlitePool;

use crate::database::{bind_all, SqlValue};

/// Answers whether a live (pending or inflight) notification already exists
/// for a recipient and template. Only ever reads.
#[derive(Clone)]
pub struct DedupeIndex {
    pool: SqlitePool,
}

impl DedupeIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `where_clause` is ANDed onto the base filter and may reference the
    /// notifications table as `n`; its `?` placeholders take `params` in order.
    pub async fn exists(
        &self,
        recipient_uid: &str,
        template_id: &str,
        where_clause: &str,
        params: &[SqlValue],
    ) -> Result<bool, sqlx::Error> {
        let sql = dedupe_sql(where_clause);
        let mut all_params = Vec::with_capacity(params.len() + 2);
        all_params.push(SqlValue::from(recipient_uid));
        all_params.push(SqlValue::from(template_id));
        all_params.extend_from_slice(params);

        let row = bind_all(sqlx::query(&sql), &all_params)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = sqlx::Row::try_get(&row, 0)?;
        Ok(count > 0)
    }
}

fn dedupe_sql(where_clause: &str) -> String {
    let mut sql = String::from(
        "SELECT COUNT(*) FROM notifications n \
         WHERE n.recipient = ? AND n.template = ? AND n.status IN ('pending', 'inflight')",
    );
    let extra = where_clause.trim();
    if !extra.is_empty() {
        sql.push_str(" AND (");
        sql.push_str(extra);
        sql.push(')');
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabasePool;

    #[test]
    fn test_sql_appends_clause() {
        assert!(dedupe_sql("  ").ends_with("('pending', 'inflight')"));
        assert!(dedupe_sql("n.created > ?").ends_with("AND (n.created > ?)"));
    }

    #[tokio::test]
    async fn test_exists_matches_live_rows_only() {
        let db = DatabasePool::in_memory().await.unwrap();
        sqlx::query("INSERT INTO notification_templates (id, code, subject, text_email) VALUES ('t1', 'c', 's', 'b')")
            .execute(db.pool())
            .await
            .unwrap();
        for (id, status, data) in [
            ("n1", "sent", r#"{"WeekEnding":"2025-03-01"}"#),
            ("n2", "pending", r#"{"WeekEnding":"2025-02-22"}"#),
        ] {
            sqlx::query(
                "INSERT INTO notifications (id, recipient, template, status, status_updated, data, created) \
                 VALUES (?, 'u1', 't1', ?, '2025-03-01 00:00:00.000000Z', ?, '2025-03-01 00:00:00.000000Z')",
            )
            .bind(id)
            .bind(status)
            .bind(data)
            .execute(db.pool())
            .await
            .unwrap();
        }

        let index = DedupeIndex::new(db.pool().clone());
        let clause = "json_extract(n.data, '$.WeekEnding') = ?";

        // A sent row never suppresses.
        assert!(!index
            .exists("u1", "t1", clause, &[SqlValue::from("2025-03-01")])
            .await
            .unwrap());
        assert!(index
            .exists("u1", "t1", clause, &[SqlValue::from("2025-02-22")])
            .await
            .unwrap());
        assert!(index.exists("u1", "t1", "", &[]).await.unwrap());
        assert!(!index.exists("u2", "t1", "", &[]).await.unwrap());
    }
}
