//! Recipient profiles.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("profile lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub uid: String,
    pub given_name: String,
    pub surname: String,
    pub email: String,
    /// Manager uid, empty when the user has none
    pub manager: String,
    /// Channel to render; only `text_email` is delivered
    pub notification_type: String,
}

impl Profile {
    /// "Given Surname", trimmed.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.surname)
            .trim()
            .to_string()
    }
}

#[derive(Clone)]
pub struct ProfileDirectory {
    pool: SqlitePool,
}

impl ProfileDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, uid: &str) -> Result<Profile, ProfileError> {
        sqlx::query_as::<_, Profile>(
            "SELECT uid, given_name, surname, email, manager, notification_type FROM profiles WHERE uid = ?",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ProfileError::NotFound(uid.to_string()))
    }

    /// Insert or replace a profile. Used for provisioning and tests.
    pub async fn upsert(&self, profile: &Profile) -> Result<(), ProfileError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (uid, given_name, surname, email, manager, notification_type)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (uid) DO UPDATE SET
                given_name = excluded.given_name,
                surname = excluded.surname,
                email = excluded.email,
                manager = excluded.manager,
                notification_type = excluded.notification_type
            "#,
        )
        .bind(&profile.uid)
        .bind(&profile.given_name)
        .bind(&profile.surname)
        .bind(&profile.email)
        .bind(&profile.manager)
        .bind(&profile.notification_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
