use super::error::NotifyError;
use super::sender::NotificationSender;
use super::store::{NewNotification, NotificationStore};
use super::types::{DeliveryMode, DispatchArgs};
use crate::feature::FeatureGate;
use crate::metrics::NotificationMetrics;
use crate::template::TemplateStore;

/// Single entry point for creating notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    features: FeatureGate,
    templates: TemplateStore,
    store: NotificationStore,
    sender: NotificationSender,
}

impl NotificationDispatcher {
    pub fn new(
        features: FeatureGate,
        templates: TemplateStore,
        store: NotificationStore,
        sender: NotificationSender,
    ) -> Self {
        Self {
            features,
            templates,
            store,
            sender,
        }
    }

    /// Create a pending notification and, in immediate mode, try to send it.
    ///
    /// Returns `Ok(None)` when creation is skipped on purpose: the template's
    /// notifications are disabled, or the feature config cannot be read.
    /// Immediate send failures are logged, never returned; the row stays
    /// queued or is closed as `error` by the send engine.
    #[tracing::instrument(
        name = "notification.dispatch",
        skip(self, args),
        fields(
            template_code = %args.template_code,
            recipient_uid = %args.recipient_uid,
            mode = args.mode.as_str(),
        )
    )]
    pub async fn dispatch(&self, args: DispatchArgs) -> Result<Option<String>, NotifyError> {
        match self.features.notifications_enabled(&args.template_code).await {
            Ok(true) => {}
            Ok(false) => {
                NotificationMetrics::record_skipped("disabled");
                tracing::info!("Notification creation skipped because feature is disabled");
                return Ok(None);
            }
            Err(e) => {
                NotificationMetrics::record_skipped("config_error");
                tracing::error!(
                    error = %e,
                    "Error reading notifications feature config; skipping notification"
                );
                return Ok(None);
            }
        }

        let template = self.templates.find_by_code(&args.template_code).await?;

        let id = self
            .store
            .insert(NewNotification {
                recipient_uid: &args.recipient_uid,
                template_id: &template.id,
                data: &args.data,
                system: args.system,
                actor_uid: &args.actor_uid,
            })
            .await?;
        NotificationMetrics::record_created(args.mode.as_str());
        tracing::debug!(notification_id = %id, "Notification created");

        if args.mode == DeliveryMode::Immediate {
            if let Err(e) = self.sender.send_by_id(&id).await {
                tracing::error!(
                    notification_id = %id,
                    error = %e,
                    "Failed to send notification immediately after creation"
                );
            }
        }

        Ok(Some(id))
    }
}
