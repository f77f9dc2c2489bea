use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::domain::Role;
use super::ownership::OwnershipRule;

/// Resource families the permission table is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Users,
    Projects,
    Allocations,
    Skills,
    WorkRequests,
    ResourceRequests,
    Tasks,
    Notifications,
}

impl ResourceCategory {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Users,
            Self::Projects,
            Self::Allocations,
            Self::Skills,
            Self::WorkRequests,
            Self::ResourceRequests,
            Self::Tasks,
            Self::Notifications,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Projects => "projects",
            Self::Allocations => "allocations",
            Self::Skills => "skills",
            Self::WorkRequests => "work_requests",
            Self::ResourceRequests => "resource_requests",
            Self::Tasks => "tasks",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Approve,
    Cancel,
    ChangeRole,
}

impl Action {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Read,
            Self::Create,
            Self::Update,
            Self::Delete,
            Self::Approve,
            Self::Cancel,
            Self::ChangeRole,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Approve => "approve",
            Self::Cancel => "cancel",
            Self::ChangeRole => "change_role",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

type RuleKey = (ResourceCategory, Action);

use Action::*;
use ResourceCategory::*;
use Role::{Admin, Employee, Hr, LineManager, Pm};

const EVERYONE: &[Role] = &[Admin, Hr, Pm, LineManager, Employee];

const ROLE_GRANTS: &[(ResourceCategory, Action, &[Role])] = &[
    (Users, Read, &[Admin, Hr]),
    (Users, Create, &[Admin, Hr]),
    (Users, Update, &[Admin, Hr]),
    (Users, Delete, &[Admin]),
    (Users, ChangeRole, &[Admin]),
    (Projects, Read, EVERYONE),
    (Projects, Create, &[Admin, Pm]),
    (Projects, Update, &[Admin]),
    (Projects, Delete, &[Admin]),
    (Allocations, Read, &[Admin, Hr, Pm]),
    (Allocations, Create, &[Admin, Hr]),
    (Allocations, Update, &[Admin, Hr]),
    (Allocations, Delete, &[Admin]),
    (Skills, Read, EVERYONE),
    (Skills, Create, &[Admin, Hr]),
    (Skills, Update, &[Admin, Hr]),
    (Skills, Delete, &[Admin]),
    (Skills, Approve, &[Admin, Hr, LineManager]),
    (Skills, Cancel, &[Admin]),
    (WorkRequests, Read, &[Admin, Hr]),
    (WorkRequests, Create, &[Admin, Hr]),
    (WorkRequests, Update, &[Admin, Hr]),
    (WorkRequests, Approve, &[Admin, Hr, LineManager, Pm]),
    (WorkRequests, Cancel, &[Admin]),
    (ResourceRequests, Read, &[Admin, Hr]),
    (ResourceRequests, Create, &[Admin, Hr, Pm]),
    (ResourceRequests, Approve, &[Admin, Hr, LineManager]),
    (ResourceRequests, Cancel, &[Admin]),
    (Tasks, Read, EVERYONE),
    (Tasks, Create, &[Admin, Pm]),
    (Tasks, Update, &[Admin, Pm]),
    (Tasks, Delete, &[Admin, Pm]),
    (Notifications, Read, &[Admin]),
    (Notifications, Delete, &[Admin]),
];

const OWNERSHIP_GRANTS: &[(ResourceCategory, Action, &[OwnershipRule])] = &[
    (
        Users,
        Read,
        &[OwnershipRule::SelfTarget, OwnershipRule::LineManagerOfSubject],
    ),
    (Users, Update, &[OwnershipRule::SelfTarget]),
    (Projects, Update, &[OwnershipRule::ProjectManager]),
    (
        Allocations,
        Read,
        &[OwnershipRule::SelfTarget, OwnershipRule::LineManagerOfSubject],
    ),
    (Allocations, Update, &[OwnershipRule::ProjectManager]),
    (Skills, Create, &[OwnershipRule::SelfTarget]),
    (Skills, Update, &[OwnershipRule::SelfTarget]),
    (Skills, Delete, &[OwnershipRule::SelfTarget]),
    (Skills, Cancel, &[OwnershipRule::Requester]),
    (WorkRequests, Create, &[OwnershipRule::SelfTarget]),
    (
        WorkRequests,
        Read,
        &[
            OwnershipRule::SelfTarget,
            OwnershipRule::Requester,
            OwnershipRule::LineManagerOfSubject,
        ],
    ),
    (WorkRequests, Cancel, &[OwnershipRule::Requester]),
    (
        ResourceRequests,
        Read,
        &[
            OwnershipRule::Requester,
            OwnershipRule::SelfTarget,
            OwnershipRule::LineManagerOfSubject,
            OwnershipRule::ProjectManager,
        ],
    ),
    (ResourceRequests, Cancel, &[OwnershipRule::Requester]),
    (Tasks, Update, &[OwnershipRule::SelfTarget]),
    (Notifications, Read, &[OwnershipRule::SelfTarget]),
    (Notifications, Update, &[OwnershipRule::SelfTarget]),
];

/// Immutable role and ownership grants, built once per process.
#[derive(Debug)]
pub struct PermissionTable {
    roles: HashMap<RuleKey, &'static [Role]>,
    ownership: HashMap<RuleKey, &'static [OwnershipRule]>,
}

impl PermissionTable {
    pub fn global() -> &'static PermissionTable {
        static TABLE: OnceLock<PermissionTable> = OnceLock::new();
        TABLE.get_or_init(PermissionTable::build)
    }

    fn build() -> Self {
        let roles = ROLE_GRANTS
            .iter()
            .map(|(category, action, roles)| ((*category, *action), *roles))
            .collect();
        let ownership = OWNERSHIP_GRANTS
            .iter()
            .map(|(category, action, rules)| ((*category, *action), *rules))
            .collect();
        Self { roles, ownership }
    }

    /// Pure lookup against the role grants; a missing entry is a deny.
    pub fn is_allowed(&self, role: Role, category: ResourceCategory, action: Action) -> bool {
        self.roles
            .get(&(category, action))
            .is_some_and(|roles| roles.contains(&role))
    }

    pub fn roles_for(&self, category: ResourceCategory, action: Action) -> &'static [Role] {
        self.roles.get(&(category, action)).copied().unwrap_or(&[])
    }

    pub fn ownership_rules(
        &self,
        category: ResourceCategory,
        action: Action,
    ) -> &'static [OwnershipRule] {
        self.ownership
            .get(&(category, action))
            .copied()
            .unwrap_or(&[])
    }

    /// True when the pair is governed by a role grant or an ownership rule.
    pub fn governs(&self, category: ResourceCategory, action: Action) -> bool {
        self.roles.contains_key(&(category, action))
            || self.ownership.contains_key(&(category, action))
    }
}

/// Shorthand for `PermissionTable::global().is_allowed(..)`.
pub fn is_allowed(role: Role, category: ResourceCategory, action: Action) -> bool {
    PermissionTable::global().is_allowed(role, category, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_pair_outside_the_table_is_denied() {
        let table = PermissionTable::global();
        let granted: HashSet<(ResourceCategory, Action, Role)> = ROLE_GRANTS
            .iter()
            .flat_map(|(category, action, roles)| {
                roles.iter().map(move |role| (*category, *action, *role))
            })
            .collect();

        for category in ResourceCategory::ordered() {
            for action in Action::ordered() {
                for role in Role::ordered() {
                    assert_eq!(
                        table.is_allowed(role, category, action),
                        granted.contains(&(category, action, role)),
                        "{role} {action} {category}"
                    );
                }
            }
        }
    }

    #[test]
    fn each_pair_has_at_most_one_role_entry() {
        let mut seen = HashSet::new();
        for (category, action, _) in ROLE_GRANTS {
            assert!(
                seen.insert((*category, *action)),
                "duplicate grant for {category} {action}"
            );
        }
    }

    #[test]
    fn only_admin_changes_roles() {
        for role in Role::ordered() {
            assert_eq!(
                is_allowed(role, Users, ChangeRole),
                role == Admin,
                "{role} change_role"
            );
        }
    }

    #[test]
    fn notification_updates_are_ownership_only() {
        let table = PermissionTable::global();
        assert!(table.roles_for(Notifications, Update).is_empty());
        assert!(table.governs(Notifications, Update));
        assert_eq!(
            table.ownership_rules(Notifications, Update),
            &[OwnershipRule::SelfTarget]
        );
    }

    #[test]
    fn ungoverned_pairs_have_no_rules() {
        let table = PermissionTable::global();
        assert!(!table.governs(Tasks, ChangeRole));
        assert!(table.ownership_rules(Tasks, ChangeRole).is_empty());
        assert!(table.roles_for(Tasks, ChangeRole).is_empty());
    }
}
