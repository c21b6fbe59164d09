//! Send engine: claims pending rows and hands them to the mailer.
//!
//! ```text
//! pending ──[claim, tx]──► inflight ──[mailer ok]──► sent
//!                              │
//!                              └──[mailer err / panic / unrenderable]──► error
//! ```
//!
//! The claim, the joined read and rendering share one transaction. Delivery
//! runs on a detached task per notification that always attempts the
//! terminal status write, even when the mailer panics.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::FutureExt;
use sqlx::SqliteConnection;
use tokio::task::JoinHandle;

use super::error::{DrainError, NotifyError, SendNextError};
use super::store::NotificationStore;
use super::types::{NotificationStatus, PendingNotification};
use crate::mailer::{EmailAddress, Mailer, OutgoingEmail};
use crate::metrics::NotificationMetrics;
use crate::template::render_text;

/// A detached delivery task and the notification it is delivering.
struct Delivery {
    notification_id: String,
    handle: JoinHandle<()>,
}

/// Tracks detached delivery tasks so shutdown can wait for them.
///
/// Handles are never aborted: a wait that is cancelled leaves the tasks
/// running and still tracked, so [`DeliveryTracker::outstanding`] can name
/// the rows that have not reached a terminal status yet.
#[derive(Clone, Default)]
pub struct DeliveryTracker {
    tasks: Arc<Mutex<Vec<Delivery>>>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn<F>(&self, notification_id: String, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        // Reap finished tasks so the list does not grow without bound.
        tasks.retain(|delivery| !delivery.handle.is_finished());
        tasks.push(Delivery {
            notification_id,
            handle,
        });
    }

    /// Number of delivery tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|delivery| !delivery.handle.is_finished())
            .count()
    }

    /// Ids of notifications whose delivery task is still running.
    pub fn outstanding(&self) -> Vec<String> {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|delivery| !delivery.handle.is_finished())
            .map(|delivery| delivery.notification_id.clone())
            .collect()
    }

    /// Wait until every spawned delivery task has finished, including tasks
    /// spawned while waiting.
    pub async fn wait_idle(&self) {
        loop {
            let batch = {
                let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *tasks)
            };
            if batch.is_empty() {
                return;
            }
            let mut batch = Requeue {
                tracker: self,
                remaining: batch,
            };
            while let Some(delivery) = batch.remaining.last_mut() {
                if let Err(e) = (&mut delivery.handle).await {
                    tracing::error!(
                        notification_id = %delivery.notification_id,
                        error = %e,
                        "Delivery task did not complete"
                    );
                }
                batch.remaining.pop();
            }
        }
    }
}

/// Puts unawaited deliveries back into the tracker when a wait is dropped.
struct Requeue<'a> {
    tracker: &'a DeliveryTracker,
    remaining: Vec<Delivery>,
}

impl Drop for Requeue<'_> {
    fn drop(&mut self) {
        if self.remaining.is_empty() {
            return;
        }
        let mut tasks = self
            .tracker
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        tasks.append(&mut self.remaining);
    }
}

/// Outcome of claiming one row inside the transaction.
enum Claim {
    /// Row missing, not pending, or claimed by someone else
    Skipped,
    /// Claimed and rendered, ready to deliver
    Ready {
        email: OutgoingEmail,
        inflight_stamp: String,
    },
    /// Claimed but could not be rendered; closed as `error` in the same tx
    Failed(NotifyError),
}

#[derive(Clone)]
pub struct NotificationSender {
    store: NotificationStore,
    mailer: Arc<dyn Mailer>,
    sender: EmailAddress,
    deliveries: DeliveryTracker,
}

impl NotificationSender {
    pub fn new(store: NotificationStore, mailer: Arc<dyn Mailer>, sender: EmailAddress) -> Self {
        Self {
            store,
            mailer,
            sender,
            deliveries: DeliveryTracker::new(),
        }
    }

    pub fn deliveries(&self) -> &DeliveryTracker {
        &self.deliveries
    }

    /// Wait for outstanding deliveries to record their terminal status.
    pub async fn wait_for_deliveries(&self) {
        self.deliveries.wait_idle().await;
    }

    /// Send a single pending notification.
    ///
    /// Succeeds without doing anything when the row is missing or no longer
    /// pending. Rendering problems close the row as `error` and are returned.
    /// Delivery itself is asynchronous; mailer failures are recorded on the
    /// row, not returned.
    #[tracing::instrument(name = "notification.send", skip(self), fields(notification_id = %id))]
    pub async fn send_by_id(&self, id: &str) -> Result<(), NotifyError> {
        let Some(snapshot) = self.store.snapshot(id).await? else {
            tracing::debug!("Notification not found, nothing to send");
            return Ok(());
        };
        if snapshot.status != NotificationStatus::Pending.as_str() {
            tracing::debug!(status = %snapshot.status, "Notification no longer pending");
            return Ok(());
        }

        let mut tx = self.store.pool().begin().await?;
        let claim = self
            .claim_and_render(&mut *tx, id, &snapshot.status_updated)
            .await?;
        tx.commit().await?;

        match claim {
            Claim::Skipped => {
                tracing::debug!("Notification claimed elsewhere");
                Ok(())
            }
            Claim::Failed(err) => {
                NotificationMetrics::record_failed("render");
                tracing::error!(error = %err, "Notification could not be rendered");
                Err(err)
            }
            Claim::Ready {
                email,
                inflight_stamp,
            } => {
                NotificationMetrics::record_claimed();
                self.spawn_delivery(id.to_string(), email, inflight_stamp);
                Ok(())
            }
        }
    }

    async fn claim_and_render(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        read_stamp: &str,
    ) -> Result<Claim, NotifyError> {
        // The write comes first so the transaction holds the write lock
        // before anything is read.
        let inflight_stamp = self.store.next_stamp(read_stamp);
        if !NotificationStore::claim(&mut *conn, id, read_stamp, &inflight_stamp).await? {
            return Ok(Claim::Skipped);
        }

        let Some(mut row) = NotificationStore::fetch_joined(&mut *conn, id).await? else {
            return Ok(Claim::Skipped);
        };
        // Render against the row as it was when claimed.
        row.status = NotificationStatus::Pending.as_str().to_string();
        row.status_updated = read_stamp.to_string();

        match self.render(&row) {
            Ok(email) => Ok(Claim::Ready {
                email,
                inflight_stamp,
            }),
            Err(err) => {
                let error_stamp = self.store.next_stamp(&inflight_stamp);
                NotificationStore::transition(
                    &mut *conn,
                    id,
                    NotificationStatus::Inflight,
                    NotificationStatus::Error,
                    &err.to_string(),
                    &error_stamp,
                )
                .await?;
                Ok(Claim::Failed(err))
            }
        }
    }

    fn render(&self, row: &PendingNotification) -> Result<OutgoingEmail, NotifyError> {
        let variables = row
            .template_variables()
            .map_err(|source| NotifyError::InvalidData {
                id: row.id.clone(),
                source,
            })?;

        let text = render_text(&row.text_email, &variables).map_err(|source| {
            NotifyError::Render {
                id: row.id.clone(),
                source,
            }
        })?;

        if row.recipient_email.trim().is_empty() {
            return Err(NotifyError::MissingRecipientEmail { id: row.id.clone() });
        }

        Ok(OutgoingEmail {
            from: self.sender.clone(),
            to: EmailAddress::new(row.recipient_name.clone(), row.recipient_email.clone()),
            subject: row.subject.clone(),
            text,
        })
    }

    fn spawn_delivery(&self, id: String, email: OutgoingEmail, inflight_stamp: String) {
        let store = self.store.clone();
        let mailer = self.mailer.clone();

        self.deliveries.spawn(id.clone(), async move {
            NotificationMetrics::delivery_started();
            let started = Instant::now();

            let outcome = match AssertUnwindSafe(mailer.send(&email)).catch_unwind().await {
                Ok(Ok(())) => {
                    NotificationMetrics::record_delivered(started.elapsed().as_secs_f64());
                    Ok(())
                }
                Ok(Err(e)) => {
                    NotificationMetrics::record_failed("smtp");
                    tracing::error!(
                        notification_id = %id,
                        error = %e,
                        "Failed to send notification email"
                    );
                    Err(e.to_string())
                }
                Err(panic) => {
                    NotificationMetrics::record_failed("panic");
                    let message = panic_message(panic.as_ref());
                    tracing::error!(
                        notification_id = %id,
                        panic = %message,
                        "Recovered from panic while sending notification email"
                    );
                    Err(format!("mailer panicked: {}", message))
                }
            };

            let intended = if outcome.is_ok() { "sent" } else { "error" };
            match store.finish(&id, &inflight_stamp, outcome).await {
                Ok(true) => {
                    tracing::debug!(notification_id = %id, status = intended, "Notification finished");
                }
                Ok(false) => {
                    NotificationMetrics::record_status_write_failure();
                    tracing::error!(
                        notification_id = %id,
                        intended_status = intended,
                        "Notification was not inflight when recording delivery result"
                    );
                }
                Err(e) => {
                    NotificationMetrics::record_status_write_failure();
                    tracing::error!(
                        notification_id = %id,
                        intended_status = intended,
                        error = %e,
                        "Failed to update notification status"
                    );
                }
            }
            NotificationMetrics::delivery_finished();
        });
    }

    /// Send one pending notification and return how many remain pending.
    ///
    /// On failure the error carries the count seen before the attempt.
    pub async fn send_next_pending(&self) -> Result<i64, SendNextError> {
        Ok(self.try_send_next().await?.unwrap_or(0))
    }

    /// `None` when the queue was empty, otherwise the remaining count.
    async fn try_send_next(&self) -> Result<Option<i64>, SendNextError> {
        let count = self
            .store
            .count_pending()
            .await
            .map_err(|e| SendNextError {
                remaining: 0,
                source: e.into(),
            })?;
        if count == 0 {
            return Ok(None);
        }

        let id = match self.store.next_pending_id().await {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err(SendNextError {
                    remaining: count,
                    source: e.into(),
                })
            }
        };

        self.send_by_id(&id).await.map_err(|source| SendNextError {
            remaining: count,
            source,
        })?;

        Ok(Some(count - 1))
    }

    /// Send pending notifications until none remain.
    ///
    /// Returns how many were processed. Stops at the first failure.
    #[tracing::instrument(name = "notification.drain", skip(self))]
    pub async fn drain(&self) -> Result<i64, DrainError> {
        let mut sent = 0;
        loop {
            match self.try_send_next().await {
                Ok(None) => break,
                Ok(Some(remaining)) => {
                    sent += 1;
                    if remaining <= 0 {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(sent_count = sent, error = %e.source, "Drain stopped");
                    return Err(DrainError {
                        sent,
                        source: e.source,
                    });
                }
            }
        }
        tracing::info!(sent_count = sent, "Drained pending notifications");
        Ok(sent)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
