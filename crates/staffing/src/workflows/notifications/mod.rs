//! Notification classification, emission, and the recipient inbox.

pub mod domain;
pub mod emitter;
pub mod inbox;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{
    classify, Notification, NotificationCategory, NotificationDraft, NotificationId,
    NotificationPriority, NotificationType, RelatedResource,
};
pub use emitter::NotificationEmitter;
pub use inbox::{InboxError, NotificationInbox};
pub use router::notification_router;
