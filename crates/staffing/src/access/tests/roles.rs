use std::sync::Arc;

use super::common::*;
use crate::access::domain::{Role, UserId};
use crate::access::guard::AccessError;
use crate::access::roles::RoleAdministration;
use crate::memory::InMemoryStore;
use crate::repository::{Directory, NotificationStore};
use crate::workflows::notifications::domain::{NotificationCategory, NotificationType};

fn administration(store: &Arc<InMemoryStore>) -> RoleAdministration<InMemoryStore, InMemoryStore> {
    RoleAdministration::new(Arc::clone(store), Arc::clone(store), 30)
}

#[test]
fn admin_changes_role_with_audit_and_notification() {
    let store = directory();
    let roles = administration(&store);

    let updated = roles
        .change_role(
            &actor("u-admin", Role::Admin),
            &UserId::new("u-emp"),
            Role::LineManager,
            Some("Team lead from May".to_string()),
        )
        .expect("admin may change roles");

    assert_eq!(updated.role, Role::LineManager);
    let stored = store
        .user_by_id(&UserId::new("u-emp"))
        .expect("lookup")
        .expect("stored");
    assert_eq!(stored.role, Role::LineManager);

    let audit = store.role_changes();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].from, Role::Employee);
    assert_eq!(audit[0].to, Role::LineManager);
    assert_eq!(audit[0].changed_by, UserId::new("u-admin"));
    assert_eq!(audit[0].reason.as_deref(), Some("Team lead from May"));

    let notifications = store
        .notifications_for(&UserId::new("u-emp"))
        .expect("notifications");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].notification_type, NotificationType::RoleChanged);
    assert_eq!(notifications[0].category, NotificationCategory::Account);
}

#[test]
fn non_admins_cannot_change_roles() {
    let store = directory();
    let roles = administration(&store);

    for (id, role) in [("u-hr", Role::Hr), ("u-lm", Role::LineManager)] {
        let error = roles
            .change_role(&actor(id, role), &UserId::new("u-emp"), Role::Hr, None)
            .expect_err("admin only");
        assert!(matches!(error, AccessError::Denied { .. }), "{id}");
    }
    assert!(store.role_changes().is_empty());
}

#[test]
fn admins_cannot_change_their_own_role() {
    let store = directory();
    let roles = administration(&store);

    let error = roles
        .change_role(
            &actor("u-admin", Role::Admin),
            &UserId::new("u-admin"),
            Role::Employee,
            None,
        )
        .expect_err("self change");

    assert!(matches!(error, AccessError::SelfRoleChange));
}

#[test]
fn unchanged_role_writes_nothing() {
    let store = directory();
    let roles = administration(&store);

    let record = roles
        .change_role(
            &actor("u-admin", Role::Admin),
            &UserId::new("u-hr"),
            Role::Hr,
            None,
        )
        .expect("no-op");

    assert_eq!(record.role, Role::Hr);
    assert!(store.role_changes().is_empty());
    assert!(store
        .notifications_for(&UserId::new("u-hr"))
        .expect("notifications")
        .is_empty());
}
