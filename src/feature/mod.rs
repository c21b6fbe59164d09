//! Feature flags read from the `app_config` table.
//!
//! Each row holds one domain (e.g. `notifications`) whose `value` is a JSON
//! object of properties. Callers always pass their own default: the
//! notifications domain defaults closed, editing domains default open.

use serde_json::{Map, Value};
use sqlx::SqlitePool;
use thiserror::Error;

/// Config domain holding one boolean per template code.
pub const NOTIFICATIONS_DOMAIN: &str = "notifications";

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("error reading config domain {domain}: {source}")]
    Database {
        domain: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("config domain {domain} is not a JSON object: {source}")]
    InvalidValue {
        domain: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone)]
pub struct FeatureGate {
    pool: SqlitePool,
}

impl FeatureGate {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Parsed value of a config domain, or `None` when the domain row is absent.
    pub async fn domain(&self, domain: &str) -> Result<Option<Map<String, Value>>, FeatureError> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM app_config WHERE key = ?")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| FeatureError::Database {
                domain: domain.to_string(),
                source,
            })?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        serde_json::from_str::<Map<String, Value>>(&raw)
            .map(Some)
            .map_err(|source| FeatureError::InvalidValue {
                domain: domain.to_string(),
                source,
            })
    }

    /// Boolean property of a domain.
    ///
    /// Returns `default` when the domain or property is missing or the
    /// property is not a boolean. Unreadable or malformed config is an error.
    pub async fn get_bool(
        &self,
        domain: &str,
        property: &str,
        default: bool,
    ) -> Result<bool, FeatureError> {
        let Some(config) = self.domain(domain).await? else {
            return Ok(default);
        };
        Ok(config
            .get(property)
            .and_then(Value::as_bool)
            .unwrap_or(default))
    }

    /// Whether notifications for `template_code` are enabled. Defaults closed.
    pub async fn notifications_enabled(&self, template_code: &str) -> Result<bool, FeatureError> {
        self.get_bool(NOTIFICATIONS_DOMAIN, template_code, false).await
    }

    /// Write a whole domain value. Used for provisioning and tests.
    pub async fn set_domain(&self, domain: &str, value: &Value) -> Result<(), FeatureError> {
        sqlx::query(
            "INSERT INTO app_config (key, value) VALUES (?, ?) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        )
        .bind(domain)
        .bind(value.to_string())
        .execute(&self.pool)
        .await
        .map_err(|source| FeatureError::Database {
            domain: domain.to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabasePool;
    use serde_json::json;

    async fn gate() -> (DatabasePool, FeatureGate) {
        let db = DatabasePool::in_memory().await.unwrap();
        let gate = FeatureGate::new(db.pool().clone());
        (db, gate)
    }

    #[tokio::test]
    async fn test_missing_domain_uses_default() {
        let (_db, gate) = gate().await;
        assert!(!gate.notifications_enabled("expense_rejected").await.unwrap());
        assert!(gate.get_bool("jobs", "create_edit_absorb", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_property_lookup() {
        let (_db, gate) = gate().await;
        gate.set_domain(
            NOTIFICATIONS_DOMAIN,
            &json!({"expense_rejected": true, "timesheet_shared": false, "weird": "yes"}),
        )
        .await
        .unwrap();

        assert!(gate.notifications_enabled("expense_rejected").await.unwrap());
        assert!(!gate.notifications_enabled("timesheet_shared").await.unwrap());
        // Non-boolean and missing properties fall back to the default.
        assert!(!gate.notifications_enabled("weird").await.unwrap());
        assert!(!gate.notifications_enabled("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_domain_is_an_error() {
        let (db, gate) = gate().await;
        sqlx::query("INSERT INTO app_config (key, value) VALUES ('notifications', 'not json')")
            .execute(db.pool())
            .await
            .unwrap();

        let result = gate.notifications_enabled("expense_rejected").await;
        assert!(matches!(result, Err(FeatureError::InvalidValue { .. })));
    }
}
