//! Roles, the permission table, ownership rules, and the guard composing them.

pub mod directory;
pub mod domain;
pub mod guard;
pub mod ownership;
pub mod permissions;
pub mod roles;
pub mod router;

#[cfg(test)]
mod tests;

pub use directory::ActorResolver;
pub use domain::{Actor, ProjectId, ProjectRecord, Role, UserId, UserRecord};
pub use guard::{AccessDecision, AccessError, AuthorizationGuard, DenialReason, Grant};
pub use ownership::{AccessTarget, OwnershipRule};
pub use permissions::{is_allowed, Action, PermissionTable, ResourceCategory};
pub use roles::{RoleAdministration, RoleChange};
pub use router::role_router;
