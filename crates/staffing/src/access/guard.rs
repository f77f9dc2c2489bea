use std::fmt;

use serde::Serialize;

use super::domain::{Actor, Role};
use super::ownership::{AccessTarget, OwnershipRule};
use super::permissions::{Action, PermissionTable, ResourceCategory};
use crate::repository::RepositoryError;

/// What satisfied an allow decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "basis", content = "value", rename_all = "snake_case")]
pub enum Grant {
    Role(Role),
    Ownership(OwnershipRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    MissingActor,
    NoRule,
    RoleNotGranted,
    MissingTarget,
    OwnershipNotSatisfied,
}

impl DenialReason {
    pub const fn summary(self) -> &'static str {
        match self {
            Self::MissingActor => "no authenticated actor",
            Self::NoRule => "no permission rule governs this action",
            Self::RoleNotGranted => "role is not granted this action",
            Self::MissingTarget => "a target is required to evaluate ownership",
            Self::OwnershipNotSatisfied => "actor does not own the target",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(Grant),
    Deny(DenialReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow(_))
    }
}

/// Errors raised while resolving or authorizing an actor.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("unknown actor `{0}`")]
    UnknownActor(String),
    #[error("actor `{0}` is deactivated")]
    InactiveActor(String),
    #[error("{action} on {category} denied: {reason}")]
    Denied {
        category: ResourceCategory,
        action: Action,
        reason: DenialReason,
    },
    #[error("actors may not change their own role")]
    SelfRoleChange,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Query-only authorization combining the role table with ownership rules.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationGuard {
    table: &'static PermissionTable,
}

impl Default for AuthorizationGuard {
    fn default() -> Self {
        Self {
            table: PermissionTable::global(),
        }
    }
}

impl AuthorizationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &'static PermissionTable {
        self.table
    }

    /// Allow when the role table or any registered ownership rule is satisfied.
    pub fn authorize(
        &self,
        actor: Option<&Actor>,
        category: ResourceCategory,
        action: Action,
        target: Option<&AccessTarget>,
    ) -> AccessDecision {
        let Some(actor) = actor else {
            return AccessDecision::Deny(DenialReason::MissingActor);
        };

        if !self.table.governs(category, action) {
            return AccessDecision::Deny(DenialReason::NoRule);
        }

        if self.table.is_allowed(actor.role, category, action) {
            return AccessDecision::Allow(Grant::Role(actor.role));
        }

        let rules = self.table.ownership_rules(category, action);
        if rules.is_empty() {
            return AccessDecision::Deny(DenialReason::RoleNotGranted);
        }

        let Some(target) = target else {
            return AccessDecision::Deny(DenialReason::MissingTarget);
        };

        rules
            .iter()
            .find(|rule| rule.holds(actor, target))
            .map(|rule| AccessDecision::Allow(Grant::Ownership(*rule)))
            .unwrap_or(AccessDecision::Deny(DenialReason::OwnershipNotSatisfied))
    }

    /// `authorize` lifted into a `Result` for `?` propagation.
    pub fn ensure(
        &self,
        actor: &Actor,
        category: ResourceCategory,
        action: Action,
        target: Option<&AccessTarget>,
    ) -> Result<Grant, AccessError> {
        match self.authorize(Some(actor), category, action, target) {
            AccessDecision::Allow(grant) => Ok(grant),
            AccessDecision::Deny(reason) => {
                tracing::debug!(
                    actor = %actor.user_id,
                    %category,
                    %action,
                    %reason,
                    "access denied"
                );
                Err(AccessError::Denied {
                    category,
                    action,
                    reason,
                })
            }
        }
    }
}
