//! Cron schedule for the reminder jobs and the optional pending sweep.

use std::fmt;

use thiserror::Error;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use crate::config::SchedulerConfig;
use crate::engine::NotificationEngine;
use crate::reminders::ReminderKind;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to create scheduler: {0}")]
    Init(String),

    #[error("invalid schedule {cron:?} for {job}: {message}")]
    Schedule {
        job: String,
        cron: String,
        message: String,
    },

    #[error("scheduler {action} failed: {message}")]
    Lifecycle {
        action: &'static str,
        message: String,
    },
}

/// Convert a standard 5-field cron expression to the 6-field form with a
/// leading seconds field. Anything else is passed through trimmed.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Runs reminder jobs on their cron schedules, in UTC.
pub struct NotificationScheduler {
    scheduler: JobScheduler,
    engine: NotificationEngine,
    registered: Vec<String>,
}

impl fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("registered", &self.registered)
            .finish()
    }
}

impl NotificationScheduler {
    pub async fn new(engine: NotificationEngine) -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Init(e.to_string()))?;

        Ok(Self {
            scheduler,
            engine,
            registered: Vec::new(),
        })
    }

    /// Names of the registered jobs.
    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    /// Register every reminder job, and the pending sweep when configured.
    pub async fn register_from_config(&mut self, config: &SchedulerConfig) -> Result<(), SchedulerError> {
        self.register_reminder(ReminderKind::PoSecondApproval, &config.po_second_approval)
            .await?;
        self.register_reminder(ReminderKind::TimesheetSubmission, &config.timesheet_submission)
            .await?;
        self.register_reminder(ReminderKind::ExpenseApproval, &config.expense_approval)
            .await?;
        self.register_reminder(ReminderKind::TimesheetApproval, &config.timesheet_approval)
            .await?;

        if let Some(cron) = config.pending_sweep.as_deref().filter(|c| !c.trim().is_empty()) {
            self.register_pending_sweep(cron).await?;
        }

        tracing::info!(jobs = ?self.registered, "All scheduled jobs registered");
        Ok(())
    }

    /// Run `kind` with send enabled on `cron`.
    pub async fn register_reminder(&mut self, kind: ReminderKind, cron: &str) -> Result<(), SchedulerError> {
        let engine = self.engine.clone();
        let schedule = normalize_cron(cron);
        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let engine = engine.clone();
            Box::pin(async move {
                tracing::info!(job = %kind, "Running scheduled reminder job");
                match engine.reminders().run_named(kind, true, None).await {
                    Ok(outcome) => {
                        if let Some(error) = &outcome.send_error {
                            tracing::warn!(job = %kind, error = %error, "Reminder job sent with errors");
                        }
                        tracing::info!(
                            job = %kind,
                            created_count = outcome.created,
                            sent_count = outcome.sent.unwrap_or(0),
                            "Scheduled reminder job finished"
                        );
                    }
                    Err(e) => {
                        tracing::error!(job = %kind, error = %e, "Scheduled reminder job failed");
                    }
                }
            })
        })
        .map_err(|e| SchedulerError::Schedule {
            job: kind.to_string(),
            cron: schedule.clone(),
            message: e.to_string(),
        })?;

        self.add(kind.as_str(), &schedule, job).await
    }

    /// Drain deferred notifications on `cron`.
    pub async fn register_pending_sweep(&mut self, cron: &str) -> Result<(), SchedulerError> {
        let engine = self.engine.clone();
        let schedule = normalize_cron(cron);
        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let engine = engine.clone();
            Box::pin(async move {
                match engine.drain().await {
                    Ok(0) => tracing::trace!("Pending sweep found nothing to send"),
                    Ok(sent) => tracing::info!(sent_count = sent, "Pending sweep sent notifications"),
                    Err(e) => tracing::error!(
                        sent_count = e.sent,
                        error = %e,
                        "Pending sweep stopped on error"
                    ),
                }
            })
        })
        .map_err(|e| SchedulerError::Schedule {
            job: "pending_sweep".to_string(),
            cron: schedule.clone(),
            message: e.to_string(),
        })?;

        self.add("pending_sweep", &schedule, job).await
    }

    async fn add(&mut self, name: &str, schedule: &str, job: CronJob) -> Result<(), SchedulerError> {
        self.scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::Schedule {
                job: name.to_string(),
                cron: schedule.to_string(),
                message: e.to_string(),
            })?;

        self.registered.push(name.to_string());
        tracing::info!(job = %name, cron = %schedule, "Registered scheduled job");
        Ok(())
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::Lifecycle {
                action: "start",
                message: e.to_string(),
            })?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::Lifecycle {
                action: "shutdown",
                message: e.to_string(),
            })?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
