use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::repository::{NotificationStore, RepositoryError};

use super::domain::{classify, Notification, NotificationDraft, NotificationId};

static NOTIFICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_notification_id() -> NotificationId {
    let id = NOTIFICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    NotificationId(format!("ntf-{id:06}"))
}

/// Turns drafts into classified, persisted notifications.
pub struct NotificationEmitter<N> {
    store: Arc<N>,
    ttl_days: u32,
}

impl<N> NotificationEmitter<N>
where
    N: NotificationStore + 'static,
{
    pub fn new(store: Arc<N>, ttl_days: u32) -> Self {
        Self { store, ttl_days }
    }

    pub fn build(&self, draft: NotificationDraft, now: DateTime<Utc>) -> Notification {
        let (category, derived_priority) = classify(&draft.notification_type);
        let expires_at =
            (self.ttl_days > 0).then(|| now + Duration::days(i64::from(self.ttl_days)));

        Notification {
            id: next_notification_id(),
            recipient: draft.recipient,
            requires_action: draft.notification_type.requires_action(),
            notification_type: draft.notification_type,
            category,
            priority: draft.priority_override.unwrap_or(derived_priority),
            message: draft.message,
            read: false,
            related: draft.related,
            context: draft.context,
            created_at: now,
            expires_at,
        }
    }

    pub fn emit(
        &self,
        draft: NotificationDraft,
        now: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError> {
        let notification = self.build(draft, now);
        self.store.insert_notification(notification)
    }

    /// Fire-and-forget emission: a storage failure is logged, never returned.
    pub fn emit_quietly(&self, draft: NotificationDraft, now: DateTime<Utc>) -> Option<Notification> {
        let recipient = draft.recipient.clone();
        let notification_type = draft.notification_type.label().to_string();
        match self.emit(draft, now) {
            Ok(notification) => {
                tracing::debug!(
                    notification = %notification.id,
                    %recipient,
                    notification_type = %notification_type,
                    "notification emitted"
                );
                Some(notification)
            }
            Err(error) => {
                tracing::warn!(%recipient, notification_type = %notification_type, %error, "failed to emit notification");
                None
            }
        }
    }
}
