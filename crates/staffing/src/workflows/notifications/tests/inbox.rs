use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::access::domain::{Actor, Role, UserId};
use crate::access::guard::AccessError;
use crate::memory::InMemoryStore;
use crate::workflows::notifications::domain::{NotificationDraft, NotificationId, NotificationType};
use crate::workflows::notifications::emitter::NotificationEmitter;
use crate::workflows::notifications::inbox::{InboxError, NotificationInbox};

fn actor(id: &str, role: Role) -> Actor {
    Actor {
        user_id: UserId::new(id),
        email: format!("{id}@staffing.test"),
        role,
    }
}

fn seeded() -> (Arc<InMemoryStore>, NotificationInbox<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let emitter = NotificationEmitter::new(Arc::clone(&store), 30);
    let now = Utc::now();
    for (offset, message) in ["first", "second", "third"].into_iter().enumerate() {
        emitter
            .emit(
                NotificationDraft::new(
                    NotificationType::LeaveRequestSubmitted,
                    UserId::new("u-lm"),
                    message,
                ),
                now + Duration::minutes(offset as i64),
            )
            .expect("stored");
    }
    emitter
        .emit(
            NotificationDraft::new(NotificationType::RoleChanged, UserId::new("u-emp"), "role"),
            now,
        )
        .expect("stored");
    (Arc::clone(&store), NotificationInbox::new(store))
}

#[test]
fn lists_own_notifications_newest_first() {
    let (_store, inbox) = seeded();

    let listed = inbox
        .list(&actor("u-lm", Role::LineManager), false)
        .expect("own inbox");

    let messages: Vec<&str> = listed.iter().map(|n| n.message.as_str()).collect();
    assert_eq!(messages, vec!["third", "second", "first"]);
}

#[test]
fn read_flag_filters_unread_listing() {
    let (_store, inbox) = seeded();
    let lm = actor("u-lm", Role::LineManager);
    let newest = inbox.list(&lm, false).expect("inbox")[0].id.clone();

    let marked = inbox.mark_read(&lm, &newest).expect("recipient marks read");
    assert!(marked.read);
    assert_eq!(inbox.list(&lm, true).expect("unread").len(), 2);

    inbox.mark_unread(&lm, &newest).expect("recipient marks unread");
    assert_eq!(inbox.list(&lm, true).expect("unread").len(), 3);
}

#[test]
fn only_the_recipient_flips_the_read_flag() {
    let (_store, inbox) = seeded();
    let lm = actor("u-lm", Role::LineManager);
    let id = inbox.list(&lm, false).expect("inbox")[0].id.clone();

    for intruder in [actor("u-admin", Role::Admin), actor("u-emp", Role::Employee)] {
        let error = inbox.mark_read(&intruder, &id).expect_err("not the recipient");
        assert!(matches!(error, InboxError::Access(AccessError::Denied { .. })));
    }
}

#[test]
fn unknown_notification_is_not_found() {
    let (_store, inbox) = seeded();
    let error = inbox
        .mark_read(
            &actor("u-lm", Role::LineManager),
            &NotificationId("ntf-missing".to_string()),
        )
        .expect_err("missing");
    assert!(matches!(error, InboxError::NotFound(_)));
}

#[test]
fn purge_is_admin_only_and_drops_expired() {
    let (store, inbox) = seeded();

    assert!(matches!(
        inbox.purge_expired(&actor("u-hr", Role::Hr), Utc::now()),
        Err(InboxError::Access(_))
    ));

    let later = Utc::now() + Duration::days(45);
    let purged = inbox
        .purge_expired(&actor("u-admin", Role::Admin), later)
        .expect("admin purges");
    assert_eq!(purged, 4);
    assert!(store.all_notifications().is_empty());
}
