//! Batched reminder runner.
//!
//! A [`ReminderJob`] names a query whose rows are candidate recipients, an
//! optional dedupe predicate evaluated per row, and a builder for each row's
//! template data. Every surviving row is dispatched deferred; the queue can
//! then be drained in the same run.

use std::fmt;

use serde::Serialize;

use crate::database::{bind_all, SqlValue, TextRow};
use crate::engine::NotificationEngine;
use crate::metrics::ReminderMetrics;
use crate::notification::{DeliveryMode, DispatchArgs, NotificationData, NotifyError};

pub type RowParams = Box<dyn Fn(&TextRow) -> Vec<SqlValue> + Send + Sync>;
pub type RowData = Box<dyn Fn(&TextRow) -> NotificationData + Send + Sync>;

/// Extra predicate for the dedupe count query.
#[derive(Default)]
pub struct DedupeSpec {
    /// SQL over the notifications table aliased `n`; empty disables dedupe
    pub where_clause: String,
    /// Values for the `?` placeholders in `where_clause`
    pub params: Option<RowParams>,
}

impl DedupeSpec {
    pub fn new(where_clause: impl Into<String>) -> Self {
        Self {
            where_clause: where_clause.into(),
            params: None,
        }
    }

    pub fn with_params<F>(mut self, params: F) -> Self
    where
        F: Fn(&TextRow) -> Vec<SqlValue> + Send + Sync + 'static,
    {
        self.params = Some(Box::new(params));
        self
    }

    fn is_enabled(&self) -> bool {
        !self.where_clause.trim().is_empty()
    }
}

pub struct ReminderJob {
    /// Short job name used in logs and metrics
    pub name: String,
    pub template_code: String,
    /// SQL producing one row per candidate recipient
    pub query: String,
    pub query_params: Vec<SqlValue>,
    /// Column holding the recipient uid
    pub recipient_column: String,
    pub dedupe: DedupeSpec,
    pub build_data: Option<RowData>,
    /// Static context appended to the summary log
    pub log_fields: Vec<(String, String)>,
}

impl fmt::Debug for ReminderJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReminderJob")
            .field("name", &self.name)
            .field("template_code", &self.template_code)
            .field("recipient_column", &self.recipient_column)
            .field("dedupe", &self.dedupe.where_clause)
            .finish()
    }
}

impl ReminderJob {
    pub fn new(
        name: impl Into<String>,
        template_code: impl Into<String>,
        query: impl Into<String>,
        recipient_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template_code: template_code.into(),
            query: query.into(),
            query_params: Vec::new(),
            recipient_column: recipient_column.into(),
            dedupe: DedupeSpec::default(),
            build_data: None,
            log_fields: Vec::new(),
        }
    }

    pub fn params(mut self, params: Vec<SqlValue>) -> Self {
        self.query_params = params;
        self
    }

    pub fn dedupe(mut self, dedupe: DedupeSpec) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn data<F>(mut self, build: F) -> Self
    where
        F: Fn(&TextRow) -> NotificationData + Send + Sync + 'static,
    {
        self.build_data = Some(Box::new(build));
        self
    }

    pub fn log_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.log_fields.push((key.into(), value.into()));
        self
    }

    fn log_context(&self) -> String {
        self.log_fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What one run of a reminder job did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderOutcome {
    pub job: String,
    pub candidates: usize,
    pub created: usize,
    pub deduplicated: usize,
    /// Rows without a recipient, or dispatches skipped by the feature gate
    pub skipped: usize,
    /// Rows whose dedupe check or dispatch failed
    pub failed: usize,
    /// Rows processed by the drain, when one was requested and succeeded
    pub sent: Option<i64>,
    pub send_error: Option<String>,
}

/// Runs reminder jobs against the engine.
#[derive(Clone)]
pub struct ReminderEngine {
    pub(crate) engine: NotificationEngine,
}

impl ReminderEngine {
    pub fn new(engine: NotificationEngine) -> Self {
        Self { engine }
    }

    /// Run `job`, then drain the queue if `send` is set.
    ///
    /// Only template resolution and the candidate query fail the job.
    /// Per-row problems are logged and counted; a failed drain is logged and
    /// reported in the outcome.
    #[tracing::instrument(name = "reminder.run", skip(self, job), fields(job = %job.name))]
    pub async fn run(&self, job: &ReminderJob, send: bool) -> Result<ReminderOutcome, NotifyError> {
        let result = self.run_inner(job, send).await;
        ReminderMetrics::record_run(&job.name, result.is_ok());
        result
    }

    async fn run_inner(&self, job: &ReminderJob, send: bool) -> Result<ReminderOutcome, NotifyError> {
        let template = self
            .engine
            .templates()
            .find_by_code(&job.template_code)
            .await?;

        let rows = bind_all(sqlx::query(&job.query), &job.query_params)
            .fetch_all(self.engine.pool())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Error querying reminder recipients");
                NotifyError::Database(e)
            })?;

        let mut outcome = ReminderOutcome {
            job: job.name.clone(),
            candidates: rows.len(),
            ..ReminderOutcome::default()
        };

        for row in rows.iter().map(TextRow::from_sqlite) {
            let recipient_uid = row.get(&job.recipient_column);
            if recipient_uid.is_empty() {
                tracing::error!(
                    recipient_column = %job.recipient_column,
                    "Reminder row missing recipient uid"
                );
                outcome.skipped += 1;
                continue;
            }

            if job.dedupe.is_enabled() {
                let params = job
                    .dedupe
                    .params
                    .as_ref()
                    .map(|params| params(&row))
                    .unwrap_or_default();
                match self
                    .engine
                    .dedupe()
                    .exists(recipient_uid, &template.id, &job.dedupe.where_clause, &params)
                    .await
                {
                    Ok(true) => {
                        ReminderMetrics::record_deduplicated(&job.name);
                        outcome.deduplicated += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(
                            recipient_uid = %recipient_uid,
                            error = %e,
                            "Error checking for existing notification"
                        );
                        outcome.failed += 1;
                        continue;
                    }
                }
            }

            let data = job
                .build_data
                .as_ref()
                .map(|build| build(&row))
                .unwrap_or_default();

            let args = DispatchArgs::new(&job.template_code, recipient_uid, DeliveryMode::Deferred)
                .data(data)
                .system(true);
            match self.engine.dispatch(args).await {
                Ok(Some(_)) => outcome.created += 1,
                Ok(None) => outcome.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        recipient_uid = %recipient_uid,
                        error = %e,
                        "Error creating reminder notification"
                    );
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            candidate_count = outcome.candidates,
            created_count = outcome.created,
            deduplicated_count = outcome.deduplicated,
            context = %job.log_context(),
            "Queued reminder notifications"
        );

        if send {
            match self.engine.drain().await {
                Ok(sent) => {
                    tracing::info!(sent_count = sent, "Sent reminder notifications");
                    outcome.sent = Some(sent);
                }
                Err(e) => {
                    tracing::error!(sent_count = e.sent, error = %e, "Error sending notifications");
                    outcome.send_error = Some(e.to_string());
                }
            }
        }

        Ok(outcome)
    }
}
