use std::sync::Arc;

use crate::access::domain::{Actor, Role, UserId, UserRecord};
use crate::memory::InMemoryStore;

pub(super) fn record(id: &str, role: Role, line_manager: Option<&str>) -> UserRecord {
    UserRecord {
        id: UserId::new(id),
        email: format!("{id}@staffing.test"),
        name: id.to_string(),
        role,
        line_manager: line_manager.map(UserId::new),
        active: true,
    }
}

pub(super) fn actor(id: &str, role: Role) -> Actor {
    Actor::from_record(&record(id, role, None))
}

pub(super) fn directory() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    store.upsert_user(record("u-admin", Role::Admin, None));
    store.upsert_user(record("u-hr", Role::Hr, None));
    store.upsert_user(record("u-lm", Role::LineManager, None));
    store.upsert_user(record("u-emp", Role::Employee, Some("u-lm")));
    let mut former = record("u-former", Role::Employee, Some("u-lm"));
    former.active = false;
    store.upsert_user(former);
    Arc::new(store)
}
