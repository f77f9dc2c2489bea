use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::access::domain::Actor;
use crate::access::guard::{AccessError, AuthorizationGuard};
use crate::access::ownership::AccessTarget;
use crate::access::permissions::{Action, ResourceCategory};
use crate::repository::{NotificationStore, RepositoryError};

use super::domain::{Notification, NotificationId};

#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("notification `{0}` not found")]
    NotFound(NotificationId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Recipient-facing operations; only the recipient flips the read flag.
pub struct NotificationInbox<N> {
    store: Arc<N>,
    guard: AuthorizationGuard,
}

impl<N> NotificationInbox<N>
where
    N: NotificationStore + 'static,
{
    pub fn new(store: Arc<N>) -> Self {
        Self {
            store,
            guard: AuthorizationGuard::new(),
        }
    }

    /// The actor's own notifications, newest first.
    pub fn list(&self, actor: &Actor, unread_only: bool) -> Result<Vec<Notification>, InboxError> {
        let target = AccessTarget::subject(actor.user_id.clone());
        self.guard.ensure(
            actor,
            ResourceCategory::Notifications,
            Action::Read,
            Some(&target),
        )?;

        let mut notifications = self.store.notifications_for(&actor.user_id)?;
        notifications.retain(|notification| !unread_only || !notification.read);
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    pub fn mark_read(&self, actor: &Actor, id: &NotificationId) -> Result<Notification, InboxError> {
        self.set_read(actor, id, true)
    }

    pub fn mark_unread(
        &self,
        actor: &Actor,
        id: &NotificationId,
    ) -> Result<Notification, InboxError> {
        self.set_read(actor, id, false)
    }

    fn set_read(
        &self,
        actor: &Actor,
        id: &NotificationId,
        read: bool,
    ) -> Result<Notification, InboxError> {
        let mut notification = self
            .store
            .notification(id)?
            .ok_or_else(|| InboxError::NotFound(id.clone()))?;

        let target = AccessTarget::subject(notification.recipient.clone());
        self.guard.ensure(
            actor,
            ResourceCategory::Notifications,
            Action::Update,
            Some(&target),
        )?;

        if notification.read != read {
            notification.read = read;
            self.store.update_notification(notification.clone())?;
        }
        Ok(notification)
    }

    /// Administrative cleanup of notifications past their expiry.
    pub fn purge_expired(&self, actor: &Actor, now: DateTime<Utc>) -> Result<usize, InboxError> {
        self.guard.ensure(
            actor,
            ResourceCategory::Notifications,
            Action::Delete,
            None,
        )?;
        let purged = self.store.purge_expired(now)?;
        tracing::info!(actor = %actor.user_id, purged, "expired notifications purged");
        Ok(purged)
    }
}
