//! Notification template system.
//!
//! This module provides:
//! - Template records keyed by a stable `code`
//! - Database-backed template lookup
//! - Strict `{{Variable}}` rendering of text bodies
//!
//! # Example
//!
//! ```ignore
//! let store = TemplateStore::new(pool);
//! let template = store.find_by_code("timesheet_rejected").await?;
//!
//! let mut variables = serde_json::Map::new();
//! variables.insert("EmployeeName".into(), json!("Ada Lovelace"));
//!
//! let text = render_text(&template.text_email, &variables)?;
//! ```

mod render;

pub use render::{find_legacy_placeholder, render_text, RenderError, LEGACY_PLACEHOLDERS};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("notification template not found: {0}")]
    NotFound(String),

    #[error("template lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// A persisted notification template.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Template {
    /// Record identifier, referenced by `notifications.template`
    pub id: String,

    /// Stable external key, e.g. `expense_rejected`
    pub code: String,

    /// Plain subject line
    pub subject: String,

    /// Text body with `{{Variable}}` placeholders
    pub text_email: String,

    #[serde(default)]
    pub description: String,
}

/// Read access to `notification_templates`.
///
/// Templates are read-only to the engine; [`TemplateStore::upsert`] exists
/// for provisioning and tests.
#[derive(Clone)]
pub struct TemplateStore {
    pool: SqlitePool,
}

impl TemplateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve a template by its `code`.
    pub async fn find_by_code(&self, code: &str) -> TemplateResult<Template> {
        sqlx::query_as::<_, Template>(
            "SELECT id, code, subject, text_email, description FROM notification_templates WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TemplateError::NotFound(code.to_string()))
    }

    /// Get a template by record id.
    pub async fn get(&self, id: &str) -> TemplateResult<Template> {
        sqlx::query_as::<_, Template>(
            "SELECT id, code, subject, text_email, description FROM notification_templates WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// List all templates ordered by code.
    pub async fn list(&self) -> TemplateResult<Vec<Template>> {
        let templates = sqlx::query_as::<_, Template>(
            "SELECT id, code, subject, text_email, description FROM notification_templates ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(templates)
    }

    /// Insert or replace a template, keyed by `code`.
    pub async fn upsert(&self, template: &Template) -> TemplateResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_templates (id, code, subject, text_email, description)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (code) DO UPDATE SET
                subject = excluded.subject,
                text_email = excluded.text_email,
                description = excluded.description
            "#,
        )
        .bind(&template.id)
        .bind(&template.code)
        .bind(&template.subject)
        .bind(&template.text_email)
        .bind(&template.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
