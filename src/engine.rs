//! Wiring for the notification engine components.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::events::EventQueuer;
use crate::feature::FeatureGate;
use crate::mailer::{EmailAddress, Mailer};
use crate::notification::{
    ActionUrlBuilder, DedupeIndex, DispatchArgs, DrainError, NotificationDispatcher,
    NotificationSender, NotificationStore, NotifyError, SendNextError,
};
use crate::profile::ProfileDirectory;
use crate::reminders::ReminderEngine;
use crate::template::TemplateStore;

/// Application identity the engine renders with.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub base_url: String,
    pub sender_name: String,
    pub sender_address: String,
}

impl From<&AppConfig> for EngineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            sender_name: config.sender_name.clone(),
            sender_address: config.sender_address.clone(),
        }
    }
}

/// All engine components over one pool, mailer and clock. Cheap to clone.
#[derive(Clone)]
pub struct NotificationEngine {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    templates: TemplateStore,
    features: FeatureGate,
    profiles: ProfileDirectory,
    store: NotificationStore,
    dedupe: DedupeIndex,
    sender: NotificationSender,
    dispatcher: NotificationDispatcher,
    urls: ActionUrlBuilder,
    mailer_backend: String,
}

impl NotificationEngine {
    pub fn new(
        pool: SqlitePool,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        options: EngineOptions,
    ) -> Self {
        let templates = TemplateStore::new(pool.clone());
        let features = FeatureGate::new(pool.clone());
        let profiles = ProfileDirectory::new(pool.clone());
        let store = NotificationStore::new(pool.clone(), clock.clone());
        let dedupe = DedupeIndex::new(pool.clone());
        let mailer_backend = mailer.backend_name().to_string();
        let sender = NotificationSender::new(
            store.clone(),
            mailer,
            EmailAddress::new(options.sender_name, options.sender_address),
        );
        let dispatcher = NotificationDispatcher::new(
            features.clone(),
            templates.clone(),
            store.clone(),
            sender.clone(),
        );

        Self {
            pool,
            clock,
            templates,
            features,
            profiles,
            store,
            dedupe,
            sender,
            dispatcher,
            urls: ActionUrlBuilder::new(&options.base_url),
            mailer_backend,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn features(&self) -> &FeatureGate {
        &self.features
    }

    pub fn profiles(&self) -> &ProfileDirectory {
        &self.profiles
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn dedupe(&self) -> &DedupeIndex {
        &self.dedupe
    }

    pub fn sender(&self) -> &NotificationSender {
        &self.sender
    }

    pub fn urls(&self) -> &ActionUrlBuilder {
        &self.urls
    }

    pub fn mailer_backend(&self) -> &str {
        &self.mailer_backend
    }

    pub fn reminders(&self) -> ReminderEngine {
        ReminderEngine::new(self.clone())
    }

    pub fn events(&self) -> EventQueuer {
        EventQueuer::new(self.clone())
    }

    pub async fn dispatch(&self, args: DispatchArgs) -> Result<Option<String>, NotifyError> {
        self.dispatcher.dispatch(args).await
    }

    pub async fn send_by_id(&self, id: &str) -> Result<(), NotifyError> {
        self.sender.send_by_id(id).await
    }

    pub async fn send_next_pending(&self) -> Result<i64, SendNextError> {
        self.sender.send_next_pending().await
    }

    pub async fn drain(&self) -> Result<i64, DrainError> {
        self.sender.drain().await
    }

    pub async fn wait_for_deliveries(&self) {
        self.sender.wait_for_deliveries().await
    }
}
