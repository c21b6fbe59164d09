//! Notification queue: dispatch, dedupe, and the send engine.

mod dedupe;
mod dispatch;
mod error;
mod sender;
mod store;
mod types;
mod url;

pub use dedupe::DedupeIndex;
pub use dispatch::NotificationDispatcher;
pub use error::{DrainError, NotifyError, SendNextError};
pub use sender::{DeliveryTracker, NotificationSender};
pub use store::{NewNotification, NotificationStore, StatusSnapshot};
pub use types::{
    DeliveryMode, DispatchArgs, NotificationData, NotificationRecord, NotificationStatus,
    PendingNotification, StatusCounts,
};
pub use url::ActionUrlBuilder;
