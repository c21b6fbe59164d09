use thiserror::Error;

use crate::profile::ProfileError;
use crate::template::{RenderError, TemplateError};

/// Errors surfaced by dispatch, the send engine and the reminder/event paths.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid delivery mode {0:?}")]
    InvalidMode(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("error marshaling notification data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("error unmarshalling notification data for {id}: {source}")]
    InvalidData {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("notification {id}: {source}")]
    Render {
        id: String,
        #[source]
        source: RenderError,
    },

    #[error("notification {id} has no recipient email address")]
    MissingRecipientEmail { id: String },

    #[error("unknown reminder job {0:?}")]
    UnknownJob(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// Failure from `send_next_pending`, carrying the pending count seen before
/// the attempt.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SendNextError {
    pub remaining: i64,
    #[source]
    pub source: NotifyError,
}

/// Failure from `drain`, carrying how many rows were processed first.
#[derive(Debug, Error)]
#[error("error sending notifications after {sent} sent: {source}")]
pub struct DrainError {
    pub sent: i64,
    #[source]
    pub source: NotifyError,
}
