use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Actor, Role, UserId, UserRecord};
use super::guard::{AccessError, AuthorizationGuard};
use super::ownership::AccessTarget;
use super::permissions::{Action, ResourceCategory};
use crate::repository::{Directory, NotificationStore, RepositoryError};
use crate::telemetry::AUDIT_TARGET;
use crate::workflows::notifications::{
    NotificationDraft, NotificationEmitter, NotificationType, RelatedResource,
};

/// Audit entry persisted alongside every role change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    pub user: UserId,
    pub from: Role,
    pub to: Role,
    pub changed_by: UserId,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// The explicit, audited path for changing a user's role.
pub struct RoleAdministration<D, N> {
    directory: Arc<D>,
    notifications: NotificationEmitter<N>,
    guard: AuthorizationGuard,
}

impl<D, N> RoleAdministration<D, N>
where
    D: Directory + 'static,
    N: NotificationStore + 'static,
{
    pub fn new(directory: Arc<D>, notifications: Arc<N>, notification_ttl_days: u32) -> Self {
        Self {
            directory,
            notifications: NotificationEmitter::new(notifications, notification_ttl_days),
            guard: AuthorizationGuard::new(),
        }
    }

    pub fn change_role(
        &self,
        actor: &Actor,
        user: &UserId,
        role: Role,
        reason: Option<String>,
    ) -> Result<UserRecord, AccessError> {
        let target = AccessTarget::subject(user.clone());
        self.guard.ensure(
            actor,
            ResourceCategory::Users,
            Action::ChangeRole,
            Some(&target),
        )?;
        if actor.is(user) {
            return Err(AccessError::SelfRoleChange);
        }

        let record = self
            .directory
            .user_by_id(user)?
            .ok_or(RepositoryError::NotFound)?;
        if record.role == role {
            return Ok(record);
        }

        let now = Utc::now();
        let change = RoleChange {
            user: user.clone(),
            from: record.role,
            to: role,
            changed_by: actor.user_id.clone(),
            reason,
            changed_at: now,
        };
        let updated = self.directory.apply_role_change(&change)?;

        tracing::info!(
            target: AUDIT_TARGET,
            user = %change.user,
            from = %change.from,
            to = %change.to,
            changed_by = %change.changed_by,
            reason = change.reason.as_deref().unwrap_or(""),
            "role changed"
        );

        self.notifications.emit_quietly(
            NotificationDraft::new(
                NotificationType::RoleChanged,
                user.clone(),
                format!("Your role changed from {} to {}", change.from, change.to),
            )
            .related(RelatedResource::new("user", user)),
            now,
        );

        Ok(updated)
    }
}
